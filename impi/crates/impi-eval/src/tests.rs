//! Evaluator end-to-end tests: full pipeline (load, parse, evaluate)
//! against scripted capabilities.

use std::cell::RefCell;
use std::rc::Rc;

use impi_lex::value::{SymKind, Value};
use impi_lex::Loader;
use impi_par::Parser;

use crate::caps::{BufferOutput, MemFiles, ScriptedInput};
use crate::{EvalError, EvalResult, Evaluator};

struct Host {
    evaluator: Evaluator,
    printed: Rc<RefCell<Vec<String>>>,
}

fn host_with_input(lines: Vec<String>) -> Host {
    let (output, printed) = BufferOutput::new();
    let (files, _) = MemFiles::new();
    Host {
        evaluator: Evaluator::with_providers(
            Box::new(ScriptedInput::new(lines)),
            Box::new(output),
            Box::new(files),
        ),
        printed,
    }
}

fn host() -> Host {
    host_with_input(Vec::new())
}

impl Host {
    async fn eval(&mut self, source: &str) -> EvalResult<Value> {
        let parsed = Parser::new().parse(Loader::load(source));
        self.evaluator.eval(&parsed).await
    }
}

async fn eval_ok(source: &str) -> Value {
    host()
        .eval(source)
        .await
        .unwrap_or_else(|e| panic!("eval of {:?} failed: {}", source, e))
}

async fn eval_err(source: &str) -> EvalError {
    match host().eval(source).await {
        Ok(value) => panic!("eval of {:?} unexpectedly produced {:?}", source, value),
        Err(e) => e,
    }
}

async fn printed(source: &str) -> Vec<String> {
    let mut h = host();
    h.eval(source)
        .await
        .unwrap_or_else(|e| panic!("eval of {:?} failed: {}", source, e));
    let lines = h.printed.borrow().clone();
    lines
}

// ---------------------------------------------------------------------
// The literal end-to-end table
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_echo_string_prints_raw() {
    assert_eq!(printed("echo \"hello\"").await, vec!["hello"]);
}

#[tokio::test]
async fn test_echo_addition() {
    assert_eq!(printed("echo 2 + 2").await, vec!["4"]);
}

#[tokio::test]
async fn test_left_associative_no_precedence() {
    assert_eq!(printed("echo 1 + 2 * 3 + 5").await, vec!["14"]);
}

#[tokio::test]
async fn test_comment_is_invisible() {
    assert_eq!(printed("echo .: note :. \"hi\"").await, vec!["hi"]);
}

#[tokio::test]
async fn test_echo_show_requotes() {
    assert_eq!(printed("echo show \"quoted\"").await, vec!["\"quoted\""]);
}

#[tokio::test]
async fn test_projection_nested() {
    assert_eq!(printed("echo[+[2;3]]").await, vec!["5"]);
}

#[tokio::test]
async fn test_strand_assignment_and_echo() {
    assert_eq!(printed("x: 1 2 3  echo x").await, vec!["1 2 3"]);
}

#[tokio::test]
async fn test_scalar_plus_iota() {
    assert_eq!(printed("echo 1 + ! 4").await, vec!["1 2 3 4"]);
}

#[tokio::test]
async fn test_chained_assignment_right_associative() {
    assert_eq!(printed("a: b: 7  echo a + b").await, vec!["14"]);
}

#[tokio::test]
async fn test_xmls_of_source_tree() {
    assert_eq!(
        printed("echo xmls [1 2; \"three\"; four]").await,
        vec![
            "<imp:lst open=\"[\" close=\"]\">\
             <imp:int v=\"1\"/><imp:int v=\"2\"/>\
             <imp:sep v=\";\"/><imp:str v=\"three\"/>\
             <imp:sep v=\";\"/><imp:sym v=\"four\"/>\
             </imp:lst>"
        ]
    );
}

// ---------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_iota_zero_is_empty_nums() {
    assert_eq!(eval_ok("! 0").await, Value::Nums(vec![]));
}

#[tokio::test]
async fn test_fold_identities_on_empty() {
    assert_eq!(eval_ok("+/ ()").await, Value::Int(0));
    assert_eq!(eval_ok("*/ ()").await, Value::Int(1));
    assert_eq!(eval_ok("min/ ()").await, Value::Num(f64::INFINITY));
    assert_eq!(eval_ok("max/ ()").await, Value::Num(f64::NEG_INFINITY));
}

#[tokio::test]
async fn test_dangling_set_word_fails() {
    let err = eval_err("x:").await;
    assert_eq!(err.to_string(), "invalid expression after set-word");
}

#[tokio::test]
async fn test_undefined_word() {
    let err = eval_err("definitely-not-a-word").await;
    assert!(matches!(err, EvalError::Lookup(_)));
    assert_eq!(err.to_string(), "undefined word: definitely-not-a-word");
}

// ---------------------------------------------------------------------
// Verbs, partials, composition
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_prefix_partial_application() {
    assert_eq!(eval_ok("inc: + 1\ninc 5").await, Value::Int(6));
}

#[tokio::test]
async fn test_infix_partial_captures_left() {
    assert_eq!(eval_ok("add2: 2 +\nadd2 3").await, Value::Int(5));
}

#[tokio::test]
async fn test_partial_arity_bookkeeping() {
    let mut h = host();
    h.eval("f: + 1").await.unwrap();
    let Some(Value::Jsf(f)) = h.evaluator.lookup("f") else {
        panic!("expected a JSF binding");
    };
    assert_eq!(f.arity, 1);
    assert_eq!(f.captured, vec![Value::Int(1)]);
    // captured + remaining equals the original arity
    assert_eq!(f.captured.len() as i32 + f.arity, 2);
    assert_eq!(h.eval("f 9").await.unwrap(), Value::Int(10));
}

#[tokio::test]
async fn test_composition_chains_right_to_left() {
    assert_eq!(printed("echo rev ! 4").await, vec!["3 2 1 0"]);
}

#[tokio::test]
async fn test_composition_arity_mismatch_fails() {
    let err = eval_err("rev + 1").await;
    assert_eq!(err.to_string(), "composition arity mismatch");
}

#[tokio::test]
async fn test_noun_evaluating_to_verb_applies() {
    assert_eq!(eval_ok("{x + 1} 4").await, Value::Int(5));
}

// ---------------------------------------------------------------------
// Fold and scan
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_fold_sums() {
    assert_eq!(eval_ok("+/ 1 2 3").await, Value::Int(6));
    assert_eq!(eval_ok("*/ 1 2 3 4").await, Value::Int(24));
}

#[tokio::test]
async fn test_fold_scalar_passthrough() {
    assert_eq!(eval_ok("+/ 7").await, Value::Int(7));
}

#[tokio::test]
async fn test_scan_emits_intermediates() {
    assert_eq!(eval_ok(r"+\ 1 2 3").await, Value::Ints(vec![1, 3, 6]));
}

#[tokio::test]
async fn test_scan_promotes_like_fold() {
    assert_eq!(eval_ok(r"+\ 1 2.5").await, Value::Nums(vec![1.0, 3.5]));
}

#[tokio::test]
async fn test_fold_equals_last_of_scan() {
    let fold = eval_ok("+/ 3 1 4 1 5").await;
    let Value::Ints(scan) = eval_ok(r"+\ 3 1 4 1 5").await else {
        panic!("expected INTs from scan");
    };
    assert_eq!(fold, Value::Int(*scan.last().unwrap()));
}

#[tokio::test]
async fn test_user_defined_fold() {
    assert_eq!(eval_ok("f: {x + y}\nf/ 1 2 3").await, Value::Int(6));
}

#[tokio::test]
async fn test_user_defined_fold_has_no_identity() {
    let err = eval_err("f: {x + y}\nf/ ()").await;
    assert!(err.to_string().contains("no identity"));
}

#[tokio::test]
async fn test_min_max_folds() {
    assert_eq!(eval_ok("min/ 3 1 4").await, Value::Int(1));
    assert_eq!(eval_ok("max/ 3 1 4").await, Value::Int(4));
}

// ---------------------------------------------------------------------
// Function literals
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_ifn_projection_application() {
    assert_eq!(eval_ok("f: {x + y}  f[3; 4]").await, Value::Int(7));
}

#[tokio::test]
async fn test_ifn_infix_application() {
    assert_eq!(eval_ok("f: {x + y}  3 f 4").await, Value::Int(7));
}

#[tokio::test]
async fn test_ifn_partial_via_projection() {
    assert_eq!(eval_ok("f: {x + y}\ng: f[1]\ng 10").await, Value::Int(11));
}

#[tokio::test]
async fn test_ifn_bindings_restored() {
    let mut h = host();
    assert_eq!(
        h.eval("x: 99\nf: {x + 1}\nf 5").await.unwrap(),
        Value::Int(6)
    );
    assert_eq!(h.evaluator.lookup("x"), Some(&Value::Int(99)));
}

#[tokio::test]
async fn test_ifn_bindings_removed_when_fresh() {
    let mut h = host();
    h.eval("f: {x + 1}\nf 5").await.unwrap();
    assert_eq!(h.evaluator.lookup("x"), None);
}

#[tokio::test]
async fn test_ifn_bindings_restored_on_error() {
    let mut h = host();
    assert!(h.eval("x: 1\nf: {x % 0}\nf 7").await.is_err());
    assert_eq!(h.evaluator.lookup("x"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_ifn_body_last_non_nil() {
    assert_eq!(eval_ok("f: {echo \"side\"  x + 1}\nf 1").await, Value::Int(2));
}

// ---------------------------------------------------------------------
// Projection details
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_projection_too_many_args() {
    let err = eval_err("+[1; 2; 3]").await;
    assert!(matches!(err, EvalError::Arity(_)));
}

#[tokio::test]
async fn test_projection_argument_groups_are_sequences() {
    assert_eq!(eval_ok("+[1 + 1; 3]").await, Value::Int(5));
}

#[tokio::test]
async fn test_projection_on_non_function() {
    let err = eval_err("n: 5  n[1]").await;
    assert!(matches!(err, EvalError::Type(_)));
}

// ---------------------------------------------------------------------
// Dictionaries
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_dict_literal_and_lookup() {
    assert_eq!(eval_ok("d: :[`a 1; `b 2]\nd `a").await, Value::Int(1));
}

#[tokio::test]
async fn test_dict_lookup_by_strand() {
    let value = eval_ok("d: :[`a 1; `b 2]\nd `a `b").await;
    let Value::Lst(lst) = value else {
        panic!("expected LST from strand lookup")
    };
    assert_eq!(lst.items, vec![Value::Int(1), Value::Int(2)]);
}

#[tokio::test]
async fn test_dict_projection_indexing() {
    assert_eq!(eval_ok("d: :[`a 1; `b 2]  d[`b]").await, Value::Int(2));
}

#[tokio::test]
async fn test_dict_keys_vals_put_at() {
    let mut h = host();
    h.eval("d: :[`a 1; `b 2]").await.unwrap();
    let Value::Syms(keys) = h.eval("keys d").await.unwrap() else {
        panic!("expected SYMs")
    };
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].name.as_str(), "a");
    assert_eq!(keys[0].kind, SymKind::Bqt);

    assert_eq!(h.eval("at[d; `b]").await.unwrap(), Value::Int(2));
    assert_eq!(h.eval("d2: put[d; `c; 3]\nd2 `c").await.unwrap(), Value::Int(3));
    // the original dictionary is untouched
    let Value::Dct(map) = h.evaluator.lookup("d").unwrap() else {
        panic!("expected DCT")
    };
    assert_eq!(map.len(), 2);
}

#[tokio::test]
async fn test_dict_key_must_be_backtick() {
    let err = eval_err(":[a 1]").await;
    assert!(err.to_string().contains("backtick"));
}

#[tokio::test]
async fn test_dict_segment_values_are_sequences() {
    assert_eq!(eval_ok("d: :[`a 1 + 1]\nd `a").await, Value::Int(2));
}

// ---------------------------------------------------------------------
// Quotes and quasiquote
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_quoted_list_contents_untouched() {
    let value = eval_ok("'[1 foo]").await;
    let Value::Lst(lst) = value else {
        panic!("expected LST")
    };
    assert_eq!(lst.open.as_str(), "[");
    assert_eq!(lst.items.len(), 2);
    assert!(matches!(&lst.items[1], Value::Sym(s) if s.kind == SymKind::Raw));
}

#[tokio::test]
async fn test_quasiquote_strips_backtick() {
    let value = eval_ok("`[1 2 3]").await;
    let Value::Lst(lst) = value else {
        panic!("expected LST")
    };
    assert_eq!(lst.open.as_str(), "[");
    // strand re-formation leaves a single INTs member
    assert_eq!(lst.items, vec![Value::Ints(vec![1, 2, 3])]);
}

#[tokio::test]
async fn test_quasiquote_splices_unquote() {
    assert_eq!(eval_ok("a: 5  show `[1 ,a 3]").await, Value::Str("[1 5 3]".to_string()));
}

#[tokio::test]
async fn test_quasiquote_strips_quote_from_spliced_symbol() {
    let value = eval_ok("a: `foo  `[,a]").await;
    let Value::Lst(lst) = value else {
        panic!("expected LST")
    };
    assert!(matches!(&lst.items[0], Value::Sym(s) if s.kind == SymKind::Raw));
}

#[tokio::test]
async fn test_quasiquote_undefined_unquote_fails() {
    assert!(matches!(eval_err("`[,missing]").await, EvalError::Lookup(_)));
}

// ---------------------------------------------------------------------
// Getters, setters, variable plumbing
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_getter_reads_without_evaluation() {
    assert_eq!(eval_ok("a: 7  :a").await, Value::Int(7));
}

#[tokio::test]
async fn test_getter_undefined_fails() {
    assert!(matches!(eval_err(":missing").await, EvalError::Lookup(_)));
}

#[tokio::test]
async fn test_get_set_words() {
    assert_eq!(eval_ok("set['v; 41]  (get 'v) + 1").await, Value::Int(42));
}

#[tokio::test]
async fn test_words_lists_definitions() {
    let Value::Syms(names) = eval_ok("myword: 1  words").await else {
        panic!("expected SYMs")
    };
    assert!(names.iter().any(|s| s.name.as_str() == "myword"));
    assert!(names.iter().any(|s| s.name.as_str() == "echo"));
}

// ---------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_ite_picks_branches() {
    assert_eq!(printed("ite[1; [echo \"t\"]; [echo \"f\"]]").await, vec!["t"]);
    assert_eq!(printed("ite[0; [echo \"t\"]; [echo \"f\"]]").await, vec!["f"]);
}

#[tokio::test]
async fn test_ite_condition_is_a_thunk() {
    assert_eq!(eval_ok("x: 3  ite[x > 2; [10]; [20]]").await, Value::Int(10));
}

#[tokio::test]
async fn test_while_loops() {
    assert_eq!(
        eval_ok("i: 0  while[i < 3; [i: i + 1]]  i").await,
        Value::Int(3)
    );
}

#[tokio::test]
async fn test_while_false_condition_never_runs() {
    assert_eq!(printed("while[0; [echo \"never\"]]").await, Vec::<String>::new());
}

#[tokio::test]
async fn test_truthiness() {
    assert_eq!(eval_ok("ite[nil; [1]; [2]]").await, Value::Int(2));
    assert_eq!(eval_ok("ite[\"\"; [1]; [2]]").await, Value::Int(1));
    assert_eq!(eval_ok("ite[0.0; [1]; [2]]").await, Value::Int(2));
}

// ---------------------------------------------------------------------
// Comma-verb sequencing
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_comma_verb_pipes_previous_value() {
    assert_eq!(eval_ok("! 3, rev").await, Value::Nums(vec![2.0, 1.0, 0.0]));
}

#[tokio::test]
async fn test_comma_verb_binary_collects_right_operand() {
    assert_eq!(eval_ok("1, + 2").await, Value::Int(3));
}

#[tokio::test]
async fn test_comma_without_verb_is_plain_separator() {
    assert_eq!(eval_ok("1, 2").await, Value::Int(2));
}

// ---------------------------------------------------------------------
// I/O words through capabilities
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_rln_reads_scripted_line() {
    let mut h = host_with_input(vec!["first line".to_string()]);
    assert_eq!(
        h.eval("rln").await.unwrap(),
        Value::Str("first line".to_string())
    );
    assert_eq!(h.eval("rln").await.unwrap(), Value::Nil);
}

#[tokio::test]
async fn test_file_round_trip() {
    let mut h = host();
    assert_eq!(h.eval("e? %notes.imp").await.unwrap(), Value::Int(0));
    h.eval("wr[%notes.imp; \"echo 9\"]").await.unwrap();
    assert_eq!(h.eval("e? %notes.imp").await.unwrap(), Value::Int(1));
    assert_eq!(
        h.eval("rd %notes.imp").await.unwrap(),
        Value::Str("echo 9".to_string())
    );
    h.eval("rm %notes.imp").await.unwrap();
    assert_eq!(h.eval("e? %notes.imp").await.unwrap(), Value::Int(0));
}

#[tokio::test]
async fn test_load_parses_source() {
    let value = eval_ok("load \"1 2; x\"").await;
    let Value::Top(items) = value else {
        panic!("expected TOP from load")
    };
    assert_eq!(items[0], Value::Ints(vec![1, 2]));
}

#[tokio::test]
async fn test_load_failure_is_err_value() {
    let value = eval_ok("load \"(1\"").await;
    assert!(matches!(value, Value::Err(_)));
}

#[tokio::test]
async fn test_load_from_file_symbol() {
    let mut h = host();
    h.eval("wr[%prog.imp; \"4 5 6\"]").await.unwrap();
    let Value::Top(items) = h.eval("load %prog.imp").await.unwrap() else {
        panic!("expected TOP")
    };
    assert_eq!(items, vec![Value::Ints(vec![4, 5, 6])]);
}

// ---------------------------------------------------------------------
// Reflection and misc
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_type_reflection() {
    assert_eq!(eval_ok("type? 1 2 3").await, Value::Str("INTs".to_string()));
    assert_eq!(eval_ok("type? \"s\"").await, Value::Str("STR".to_string()));
}

#[tokio::test]
async fn test_part_reflection() {
    assert_eq!(eval_ok("part 'a").await, Value::Str("Q".to_string()));
    assert_eq!(eval_ok("part 1").await, Value::Str("N".to_string()));
}

#[tokio::test]
async fn test_len_of_rev_invariant() {
    assert_eq!(eval_ok("len rev 1 2 3").await, Value::Int(3));
    assert_eq!(eval_ok("len rev \"abcd\"").await, Value::Int(4));
}

#[tokio::test]
async fn test_paren_sequence_returns_last() {
    assert_eq!(eval_ok("(1 + 1  5)").await, Value::Int(5));
}

#[tokio::test]
async fn test_bracket_sequence_collects() {
    let Value::Lst(lst) = eval_ok("[1 + 1; 5]").await else {
        panic!("expected LST")
    };
    assert_eq!(lst.items, vec![Value::Int(2), Value::Int(5)]);
}

#[tokio::test]
async fn test_nil_results_are_nil() {
    assert_eq!(eval_ok("echo \"x\"").await, Value::Nil);
    assert_eq!(eval_ok("ok").await, Value::Nil);
    assert_eq!(eval_ok("nil").await, Value::Nil);
}

// ---------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------

mod props {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_fold_is_last_of_scan(v in proptest::collection::vec(-1000i64..1000, 1..12)) {
            let text = v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
            let (fold, scan) = block_on(async {
                let mut h = host();
                let fold = h.eval(&format!("+/ ({})", text)).await.unwrap();
                let scan = h.eval(&format!(r"+\ ({})", text)).await.unwrap();
                (fold, scan)
            });
            match (fold, scan) {
                (f, Value::Ints(s)) => prop_assert_eq!(f, Value::Int(*s.last().unwrap())),
                (f, Value::Int(s)) => prop_assert_eq!(f, Value::Int(s)),
                other => return Err(TestCaseError::fail(format!("unexpected shapes: {:?}", other))),
            }
        }

        #[test]
        fn prop_len_rev_preserved(v in proptest::collection::vec(-50i64..50, 0..10)) {
            let text = v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" ");
            let len = block_on(async {
                host().eval(&format!("len rev ({})", text)).await.unwrap()
            });
            prop_assert_eq!(len, Value::Int(v.len() as i64));
        }
    }
}
