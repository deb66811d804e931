mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use helpers::{builtin, call, compile, engine_from_yaml, message};
use rpipeline_eval::{
    ConditionOutcome, EngineConfig, EvalError, EvalResult, EvaluationContext, EvaluationState,
    Expression,
    Function, FunctionArgs, FunctionDescriptor, FunctionRegistry, ParameterDescriptor, Rule,
    TypeTag, Value, evaluate_rule, fold_constant_args,
};

/// Returns its `value` argument, counting how often the transform runs and
/// how often `preprocess_args` is called.
struct Probe {
    value: ParameterDescriptor,
    missing: ParameterDescriptor,
    descriptor: FunctionDescriptor,
    transforms: Arc<AtomicUsize>,
    preprocessed: Arc<AtomicUsize>,
}

impl Probe {
    fn new() -> Self {
        let transforms = Arc::new(AtomicUsize::new(0));
        let counter = transforms.clone();
        let value = ParameterDescriptor::string("value").transform(TypeTag::String, move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::String(format!("<{v}>")))
        });
        let missing = ParameterDescriptor::any("missing").optional();
        let descriptor =
            FunctionDescriptor::new("probe", TypeTag::String, [value.clone(), missing.clone()]);
        Probe {
            value,
            missing,
            descriptor,
            transforms,
            preprocessed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Function for Probe {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, args: &FunctionArgs, ctx: &mut EvaluationContext) -> EvalResult<Value> {
        assert!(self.missing.eval_required::<Value>(args, ctx)?.is_none());
        let value: String = self.value.require(args, ctx)?;
        Ok(Value::String(value))
    }

    fn preprocess_args(&self, args: &mut FunctionArgs) -> EvalResult<()> {
        self.preprocessed.fetch_add(1, Ordering::SeqCst);
        fold_constant_args(&self.descriptor, args)
    }
}

#[test]
fn folding_is_value_preserving() {
    let probe = Arc::new(Probe::new());
    let folded = call(probe.clone(), vec![("value", Expression::literal("abc"))]);
    let dynamic = call(probe.clone(), vec![("value", Expression::field("message"))]);

    let mut msg = message();
    msg.add_field("message", Value::from("abc"));
    let mut ctx = EvaluationContext::new(msg);

    assert_eq!(folded.evaluate(&mut ctx).unwrap(), Value::from("<abc>"));
    assert_eq!(dynamic.evaluate(&mut ctx).unwrap(), Value::from("<abc>"));
}

#[test]
fn folding_runs_once_per_construction() {
    let probe = Arc::new(Probe::new());
    let folded = call(probe.clone(), vec![("value", Expression::literal("abc"))]);
    assert_eq!(probe.preprocessed.load(Ordering::SeqCst), 1);
    assert_eq!(probe.transforms.load(Ordering::SeqCst), 1);

    let mut ctx = EvaluationContext::new(message());
    for _ in 0..5 {
        folded.evaluate(&mut ctx).unwrap();
    }
    assert_eq!(probe.preprocessed.load(Ordering::SeqCst), 1);
    assert_eq!(probe.transforms.load(Ordering::SeqCst), 1);

    // a field argument is not constant and is transformed on every call
    let dynamic = call(probe.clone(), vec![("value", Expression::field("source"))]);
    for _ in 0..3 {
        dynamic.evaluate(&mut ctx).unwrap();
    }
    assert_eq!(probe.preprocessed.load(Ordering::SeqCst), 2);
    assert_eq!(probe.transforms.load(Ordering::SeqCst), 4);
}

#[test]
fn unbound_parameter_is_absent() {
    let probe = Arc::new(Probe::new());
    let call = call(probe, vec![("value", Expression::literal("x"))]);
    let mut ctx = EvaluationContext::new(message());
    // Probe asserts internally that `missing` evaluates to None
    assert_eq!(call.evaluate(&mut ctx).unwrap(), Value::from("<x>"));
}

#[test]
fn missing_required_argument_at_runtime() {
    let probe = Arc::new(Probe::new());
    let call = call(probe, vec![]);
    let mut ctx = EvaluationContext::new(message());
    assert_eq!(
        call.evaluate(&mut ctx).unwrap_err(),
        EvalError::MissingArgument {
            function: "probe".into(),
            parameter: "value".into()
        }
    );
}

#[test]
fn absent_transform_is_identity() {
    let set_field = builtin("set_field");
    let object = Value::Object(serde_json::json!({"nested": [1, 2, 3]}));
    let stmt = call(
        set_field,
        vec![
            ("field", Expression::literal("obj")),
            ("value", Expression::literal(object.clone())),
        ],
    );
    let rule = Rule::new("identity", Expression::literal(true), vec![stmt]);
    let ctx = evaluate_rule(&rule, message());
    assert_eq!(ctx.current_message().get_field("obj"), Some(object));
}

#[test]
fn set_year_when_condition_holds() {
    let rule = compile(
        r#"
title: year
when: true
then:
  - call: set_field
    args: {field: year, value: 2010}
"#,
    );
    let ctx = evaluate_rule(&rule, message());
    assert!(ctx.matched());
    assert!(!ctx.has_evaluation_errors());
    assert_eq!(ctx.state(), EvaluationState::Completed);
    assert_eq!(
        ctx.current_message().get_field("year"),
        Some(Value::Integer(2010))
    );
}

#[test]
fn mistyped_constant_in_condition_is_recorded() {
    // has_field wants a string; the compiler would reject this, so build
    // the rule by hand
    let condition = call(builtin("has_field"), vec![("field", Expression::literal(42))]);
    let Expression::Function(node) = &condition else {
        unreachable!()
    };
    assert!(matches!(
        node.folding_error(),
        Some(EvalError::Coercion { expected: TypeTag::String, found: TypeTag::Integer, .. })
    ));

    let statement = call(
        builtin("set_field"),
        vec![
            ("field", Expression::literal("touched")),
            ("value", Expression::literal(true)),
        ],
    );
    let rule = Rule::new("mistyped", condition, vec![statement]);

    let original = message();
    let ctx = evaluate_rule(&rule, original.clone());
    assert_eq!(ctx.condition_outcome(), ConditionOutcome::Failed);
    assert!(!ctx.matched());
    assert_eq!(ctx.evaluation_errors().len(), 1);
    assert!(matches!(
        ctx.evaluation_errors()[0].error,
        EvalError::Coercion { .. }
    ));
    assert_eq!(ctx.current_message(), &original);
}

#[test]
fn created_message_is_separate() {
    let rule = compile(
        r#"
title: new message
then:
  - let: x
    value: {call: create_message}
  - call: set_field
    args: {field: removed_again, value: foo, message: {var: x}}
  - call: set_field
    args: {field: only_in, value: new message, message: {var: x}}
  - call: set_fields
    args: {fields: {map: {multi: new message}}, message: {var: x}}
  - call: set_field
    args:
      field: has_source
      value: {call: has_field, args: {field: source, message: {var: x}}}
      message: {var: x}
  - call: remove_field
    args: {field: removed_again, message: {var: x}}
"#,
    );
    let ctx = evaluate_rule(&rule, message());
    assert!(!ctx.has_evaluation_errors(), "{:?}", ctx.evaluation_errors());

    let original = ctx.current_message();
    assert_eq!(ctx.created_messages().len(), 1);
    let created = &ctx.created_messages()[0];

    assert_ne!(original, created);
    assert!(!created.has_field("removed_again"));
    assert_eq!(created.get_field_as::<bool>("has_source"), Some(true));
    assert_eq!(
        created.get_field_as::<String>("only_in").as_deref(),
        Some("new message")
    );
    assert_eq!(
        created.get_field_as::<String>("multi").as_deref(),
        Some("new message")
    );
    assert!(!original.has_field("only_in"));
    assert!(!original.has_field("multi"));
}

#[test]
fn contexts_are_independent() {
    let rule = compile(
        r#"
title: create
then:
  - call: create_message
  - call: set_field
    args: {field: seen, value: true}
"#,
    );
    let a = evaluate_rule(&rule, message());
    let b = evaluate_rule(&rule, message());

    assert_eq!(a.created_messages().len(), 1);
    assert_eq!(b.created_messages().len(), 1);
    assert_eq!(a.current_message(), b.current_message());
    assert!(a.current_message().has_field("seen"));
}

#[test]
fn concurrent_evaluation_shares_one_rule() {
    let rule = compile(
        r#"
title: tag
when: {ne: [{field: n}, null]}
then:
  - call: set_field
    args: {field: double, value: {call: to_string, args: {value: {field: n}}}}
"#,
    );

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8_i64)
            .map(|i| {
                let rule = &rule;
                s.spawn(move || {
                    let mut msg = message();
                    msg.add_field("n", Value::Integer(i));
                    let ctx = evaluate_rule(rule, msg);
                    (i, ctx.current_message().get_field("double"))
                })
            })
            .collect();
        for h in handles {
            let (i, double) = h.join().unwrap();
            assert_eq!(double, Some(Value::String(i.to_string())));
        }
    });
}

#[test]
fn statement_errors_do_not_stop_the_rule() {
    let rule = compile(
        r#"
title: partial
then:
  - call: set_fields
    args: {fields: {field: not_an_object}}
  - call: set_field
    args: {field: after, value: 1}
"#,
    );
    let mut msg = message();
    msg.add_field("not_an_object", Value::from("text"));
    let ctx = evaluate_rule(&rule, msg);

    assert!(ctx.matched());
    assert_eq!(ctx.evaluation_errors().len(), 1);
    assert!(ctx.evaluation_errors()[0].expression.starts_with("set_fields("));
    assert!(ctx.current_message().has_field("after"));
}

#[test]
fn drop_stops_remaining_statements() {
    let rule = compile(
        r#"
title: drop
then:
  - call: drop_message
  - call: set_field
    args: {field: after, value: 1}
"#,
    );
    let ctx = evaluate_rule(&rule, message());
    assert!(ctx.is_dropped());
    assert_eq!(ctx.state(), EvaluationState::Dropped);
    assert!(!ctx.has_evaluation_errors());
    assert!(!ctx.current_message().has_field("after"));
}

#[test]
fn false_condition_skips_statements() {
    let rule = compile(
        r#"
title: skip
when: {and: [true, {call: has_field, args: {field: missing}}]}
then:
  - call: set_field
    args: {field: after, value: 1}
"#,
    );
    let ctx = evaluate_rule(&rule, message());
    assert_eq!(ctx.condition_outcome(), ConditionOutcome::NotMatched);
    assert!(!ctx.has_evaluation_errors());
    assert!(!ctx.current_message().has_field("after"));
}

#[test]
fn function_return_type_is_enforced() {
    struct Liar(FunctionDescriptor);

    impl Function for Liar {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.0
        }

        fn evaluate(&self, _: &FunctionArgs, _: &mut EvaluationContext) -> EvalResult<Value> {
            Ok(Value::from("not a bool"))
        }
    }

    let mut registry = FunctionRegistry::new();
    registry
        .register(Liar(FunctionDescriptor::new("liar", TypeTag::Bool, [])))
        .unwrap();
    let rule = helpers::compile_with("title: lie\nwhen: {call: liar}\n", &registry);

    let ctx = evaluate_rule(&rule, message());
    assert_eq!(ctx.condition_outcome(), ConditionOutcome::Failed);
    let error = &ctx.evaluation_errors()[0].error;
    assert!(error.is_defect());
    assert_eq!(
        error,
        &EvalError::ReturnType {
            function: "liar".into(),
            declared: TypeTag::Bool,
            actual: TypeTag::String,
        }
    );
}

#[test]
fn message_handles_are_not_stored_in_fields() {
    let engine = engine_from_yaml(
        r#"
title: keep handle
then:
  - let: m
    value: {call: create_message, args: {message: first-created}}
  - call: set_field
    args: {field: ref, value: {var: m}}
---
title: use handle
then:
  - let: other
    value: {call: create_message, args: {message: second-created}}
  - call: set_field
    args: {field: tagged, value: "yes", message: {field: ref}}
"#,
        EngineConfig::default(),
    );
    let result = engine.process(message());

    assert!(!result.message.has_field("ref"));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].rule, "keep handle");

    assert_eq!(result.created.len(), 2);
    let second = &result.created[1];
    assert_eq!(second.message(), Some("second-created"));
    assert!(!second.has_field("tagged"));
}

#[test]
fn rename_to_rejected_name_is_recorded() {
    let rule = compile(
        r#"
title: rename
then:
  - call: rename_field
    args: {old_field: keep, new_field: timestamp}
"#,
    );
    let mut msg = message();
    msg.add_field("keep", Value::from("important"));
    let ctx = evaluate_rule(&rule, msg);

    assert_eq!(ctx.evaluation_errors().len(), 1);
    assert!(matches!(
        ctx.evaluation_errors()[0].error,
        EvalError::Function { ref function, .. } if function == "rename_field"
    ));
    assert_eq!(
        ctx.current_message().get_field("keep"),
        Some(Value::from("important"))
    );
    assert_eq!(ctx.current_message().timestamp(), Some(helpers::epoch()));
}

#[test]
fn arguments_evaluate_in_declaration_order() {
    // `value` is declared before `prefix`, so its binding is visible there
    let rule = compile(
        r#"
title: order
then:
  - call: set_field
    args:
      field: x
      value: {let: p, value: pre_}
      prefix: {var: p}
"#,
    );
    let ctx = evaluate_rule(&rule, message());
    assert!(!ctx.has_evaluation_errors(), "{:?}", ctx.evaluation_errors());
    assert_eq!(
        ctx.current_message().get_field("pre_x"),
        Some(Value::from("pre_"))
    );
}
