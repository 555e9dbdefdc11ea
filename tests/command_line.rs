use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use modwrap::args::{deserialize, Parsed};
use modwrap::command::{serialize, WorkflowContext};
use modwrap::entry::ModuleInstance;
use modwrap::descriptor::{Direction, ModuleDescriptor, ParameterDescriptor, Value, ValueMap, ValueType};
use modwrap::error::{Phase, SerializationError, ValidationError};

fn caller() -> ModuleDescriptor {
    let parameters = vec![
        ParameterDescriptor::new("sample", ValueType::String).with_flag("--sample-name").with_delimiter("="),
        ParameterDescriptor::new("threads", ValueType::Integer).with_flag("-t").with_order(1),
        ParameterDescriptor::new("min_quality", ValueType::Float).with_flag("-q").with_order(2),
        ParameterDescriptor::new("emit_all", ValueType::Boolean).with_flag("--emit-all").with_order(3),
        ParameterDescriptor::new("since", ValueType::Date).with_flag("--since").with_order(4),
        ParameterDescriptor::new("mode", ValueType::Enum(vec!["A".into(), "B".into(), "C".into()]))
            .with_flag("-m")
            .with_delimiter("")
            .with_order(5),
        ParameterDescriptor::new("intervals", ValueType::List(Box::new(ValueType::File)))
            .with_flag("-L")
            .with_order(6),
        ParameterDescriptor::new("comment", ValueType::String)
            .with_flag("--comment")
            .wrap_in_quotes()
            .with_order(7),
        ParameterDescriptor::new("reference", ValueType::File).required().with_order(8),
        ParameterDescriptor::new("reads", ValueType::List(Box::new(ValueType::File))).with_order(9),
        ParameterDescriptor::new("calls", ValueType::File)
            .with_direction(Direction::Output)
            .redirect()
            .persist_output(),
    ];
    ModuleDescriptor::new("caller", "{tool_home}/bin/caller call", Duration::from_secs(60), parameters).unwrap()
}

fn context() -> WorkflowContext {
    WorkflowContext::new("germline").with_var("tool_home", "/opt/caller")
}

fn values() -> ValueMap {
    vec![
        ("sample", Value::String("NA12878".into())),
        ("threads", Value::Integer(8)),
        ("min_quality", Value::Float(0.25)),
        ("emit_all", Value::Boolean(true)),
        ("since", Value::Date(Utc.timestamp_millis_opt(1_687_000_000_123).unwrap())),
        ("mode", Value::Enum("B".into())),
        (
            "intervals",
            Value::List(vec![Value::File("/data/a.bed".into()), Value::File("/data/b.bed".into())]),
        ),
        ("comment", Value::String("two words".into())),
        ("reference", Value::File("/data/ref.fa".into())),
        (
            "reads",
            Value::List(vec![Value::File("/data/r1.fq".into()), Value::File("/data/r2.fq".into())]),
        ),
        ("calls", Value::File("/data/calls.vcf".into())),
    ]
    .into_iter()
    .collect()
}

fn parsed(parsed: Parsed) -> modwrap::args::Deserialized {
    match parsed {
        Parsed::Args(args) => args,
        Parsed::Help => panic!("unexpected help"),
    }
}

#[test]
fn serialized_tokens_parse_back_to_the_same_values() {
    let descriptor = caller();
    let values = values();
    let invocation = serialize(&descriptor, &values, &context()).unwrap();

    let back = parsed(deserialize(&descriptor, invocation.tokens()));
    assert!(back.is_valid(), "{:?}", back.errors);
    assert!(back.warnings.is_empty(), "{:?}", back.warnings);

    // the redirect target travels outside the argument list
    let mut expected = values;
    expected.remove("calls");
    assert_eq!(back.values, expected);
}

#[test]
fn command_line_follows_parameter_order() {
    let invocation = serialize(&caller(), &values(), &context()).unwrap();

    assert_eq!(invocation.program(), ["/opt/caller/bin/caller", "call"]);
    assert_eq!(
        invocation.tokens(),
        [
            "--sample-name=NA12878",
            "-t",
            "8",
            "-q",
            "0.25",
            "--emit-all",
            "--since",
            "1687000000123",
            "-mB",
            "-L",
            "/data/a.bed",
            "-L",
            "/data/b.bed",
            "--comment",
            "two words",
            "/data/ref.fa",
            "/data/r1.fq",
            "/data/r2.fq",
        ]
    );
    assert_eq!(
        invocation.command(),
        "/opt/caller/bin/caller call --sample-name=NA12878 -t 8 -q 0.25 --emit-all --since 1687000000123 \
         -mB -L /data/a.bed -L /data/b.bed --comment 'two words' /data/ref.fa /data/r1.fq /data/r2.fq"
    );
    assert_eq!(invocation.redirect_target(), Some(std::path::Path::new("/data/calls.vcf")));
    assert!(invocation.to_string().ends_with(" > /data/calls.vcf"));
}

#[test]
fn serialization_is_deterministic() {
    let descriptor = caller();
    let first = serialize(&descriptor, &values(), &context()).unwrap();
    let second = serialize(&descriptor, &values(), &context()).unwrap();
    assert_eq!(first.command(), second.command());
    assert_eq!(first.tokens(), second.tokens());
}

#[test]
fn equal_order_keeps_declaration_order() {
    let parameters = vec![
        ParameterDescriptor::new("zeta", ValueType::String).with_flag("-z"),
        ParameterDescriptor::new("alpha", ValueType::String).with_flag("-a"),
        ParameterDescriptor::new("first", ValueType::String).with_flag("-f").with_order(-1),
    ];
    let descriptor = ModuleDescriptor::new("ordered", "tool", Duration::from_secs(1), parameters).unwrap();
    let values: ValueMap = vec![
        ("alpha", Value::String("1".into())),
        ("zeta", Value::String("2".into())),
        ("first", Value::String("3".into())),
    ]
    .into_iter()
    .collect();

    let invocation = serialize(&descriptor, &values, &WorkflowContext::new("wf")).unwrap();
    assert_eq!(invocation.tokens(), ["-f", "3", "-z", "2", "-a", "1"]);
}

#[test]
fn false_boolean_and_absent_values_are_omitted() {
    let descriptor = caller();
    let values: ValueMap = vec![
        ("emit_all", Value::Boolean(false)),
        ("reference", Value::File("/data/ref.fa".into())),
    ]
    .into_iter()
    .collect();

    let invocation = serialize(&descriptor, &values, &context()).unwrap();
    assert_eq!(invocation.tokens(), ["/data/ref.fa"]);
    assert_eq!(invocation.redirect_target(), None);

    let back = parsed(deserialize(&descriptor, invocation.tokens()));
    assert_eq!(back.values.get("emit_all"), None);
}

#[test]
fn enum_value_outside_the_set_is_rejected() {
    let descriptor = caller();
    let mut values = values();
    values.insert("mode", Value::Enum("D".into()));

    let err = serialize(&descriptor, &values, &context()).unwrap_err();
    assert_eq!(
        err,
        SerializationError::NotInSet {
            name: "mode".into(),
            value: "D".into(),
            valid: vec!["A".into(), "B".into(), "C".into()],
        }
    );

    let back = parsed(deserialize(&descriptor, &["-mD", "/data/ref.fa"]));
    assert!(!back.is_valid());
    assert!(matches!(&back.errors[0], ValidationError::NotInSet { value, .. } if value == "D"));
}

#[test]
fn missing_required_input_is_reported() {
    let descriptor = caller();
    let back = parsed(deserialize(&descriptor, &["-t", "4"]));

    assert!(!back.is_valid());
    assert_eq!(
        back.errors,
        vec![ValidationError::MissingRequired { name: "reference".into(), phase: Phase::Input }]
    );
}

#[test]
fn entry_options_are_separated_from_values() {
    let descriptor = caller();
    let back = parsed(deserialize(
        &descriptor,
        &[
            "--workflowRunAttemptId",
            "17",
            "--sampleId",
            "3",
            "--dryRun",
            "--validate",
            "FALSE",
            "--persistFileData",
            "/data/ref.fa",
        ],
    ));

    assert!(back.is_valid(), "{:?}", back.errors);
    assert_eq!(back.options.workflow_run_attempt_id, Some(17));
    assert_eq!(back.options.sample_id, Some(3));
    assert!(back.options.dry_run);
    assert!(!back.options.validate_outputs());
    assert!(back.options.persist_file_data);
    assert_eq!(back.values.len(), 1);
}

#[test]
fn help_wins_over_everything_else() {
    assert_eq!(deserialize(&caller(), &["-t", "four", "-?"]), Parsed::Help);
}

#[test]
fn current_time_round_trips_through_a_module_instance() {
    let descriptor = Arc::new(caller());
    let mut instance = ModuleInstance::new(descriptor.clone());
    for (name, value) in values() {
        instance.assign(&name, value).unwrap();
    }
    instance.assign("since", Value::Date(Utc::now())).unwrap();

    let invocation = instance.build(&context()).unwrap();
    let back = parsed(deserialize(&descriptor, invocation.tokens()));
    assert!(back.is_valid(), "{:?}", back.errors);

    let mut expected = instance.values().clone();
    expected.remove("calls");
    assert_eq!(back.values, expected);
}

#[test]
fn sub_millisecond_dates_are_rejected() {
    let since = Utc.timestamp_millis_opt(1_687_000_000_123).unwrap() + chrono::Duration::nanoseconds(456_789);
    let mut values = values();
    values.insert("since", Value::Date(since));

    let err = serialize(&caller(), &values, &context()).unwrap_err();
    assert!(matches!(err, SerializationError::SubMillisecondDate { ref name, .. } if name == "since"));
    assert!(matches!(
        &caller().validate(&values, Phase::Input)[..],
        [ValidationError::Malformed { name, .. }] if name == "since"
    ));
}

fn grep() -> ModuleDescriptor {
    let parameters = vec![
        ParameterDescriptor::new("count", ValueType::Boolean).with_flag("-c"),
        ParameterDescriptor::new("pattern", ValueType::String).required().with_order(1),
        ParameterDescriptor::new("input", ValueType::File).required().with_order(2),
        ParameterDescriptor::new("context", ValueType::Integer).with_flag("-C").with_order(3),
    ];
    ModuleDescriptor::new("grep", "grep", Duration::from_secs(60), parameters).unwrap()
}

#[test]
fn dash_prefixed_positional_values_round_trip() {
    let descriptor = grep();
    let values: ValueMap = vec![
        ("count", Value::Boolean(true)),
        ("pattern", Value::String("-v".into())),
        ("input", Value::File("/data/calls.vcf".into())),
    ]
    .into_iter()
    .collect();

    let invocation = serialize(&descriptor, &values, &WorkflowContext::new("wf")).unwrap();
    assert_eq!(invocation.tokens(), ["-c", "--", "-v", "/data/calls.vcf"]);
    assert_eq!(invocation.command(), "grep -c -- -v /data/calls.vcf");

    let back = parsed(deserialize(&descriptor, invocation.tokens()));
    assert!(back.is_valid(), "{:?}", back.errors);
    assert!(back.warnings.is_empty(), "{:?}", back.warnings);
    assert_eq!(back.values, values);
}

#[test]
fn flags_after_the_end_of_options_marker_are_rejected() {
    let values: ValueMap = vec![
        ("pattern", Value::String("-v".into())),
        ("input", Value::File("/data/calls.vcf".into())),
        ("context", Value::Integer(2)),
    ]
    .into_iter()
    .collect();

    let err = serialize(&grep(), &values, &WorkflowContext::new("wf")).unwrap_err();
    assert_eq!(err, SerializationError::FlagAfterEndOfOptions("context".into()));
}

#[test]
fn tokens_after_double_dash_are_positional() {
    let back = parsed(deserialize(&grep(), &["--", "--dryRun", "-c"]));
    assert!(back.is_valid(), "{:?}", back.errors);
    assert!(!back.options.dry_run);
    assert_eq!(back.values.get("pattern"), Some(&Value::String("--dryRun".into())));
    assert_eq!(back.values.get("input"), Some(&Value::File("-c".into())));
}

#[test]
fn embedded_single_quotes_are_escaped() {
    let mut values = values();
    values.insert("comment", Value::String("it's".into()));

    let invocation = serialize(&caller(), &values, &context()).unwrap();
    assert!(invocation.command().contains(r"--comment 'it'\''s'"), "{}", invocation.command());

    let back = parsed(deserialize(&caller(), invocation.tokens()));
    assert_eq!(back.values.get("comment"), Some(&Value::String("it's".into())));
}
