use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::Duration,
};

use lworld_class_file::{AccessFlags, FieldType};
use lworld_runtime::{
    ClassCode, ClassDefinition, ClassLoader, ClassSource, ErrorKind, Field, InMemoryClassSource,
    InitState, InitializationPolicy, Value, VmError,
};
use lworld_testkit::{fixtures, flags::*, AttributeSpec, ClassFileBuilder, FieldSpec};

/// Records every name the loader asks for.
#[derive(Default)]
struct RecordingSource {
    inner: InMemoryClassSource,
    requests: Mutex<Vec<String>>,
}

impl RecordingSource {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ClassSource for RecordingSource {
    fn find_class(&self, name: &str) -> Option<ClassDefinition> {
        self.requests.lock().unwrap().push(name.to_owned());
        self.inner.find_class(name)
    }
}

/// Holds up the first lookup of one name until the test lets it through.
struct GatedSource {
    inner: InMemoryClassSource,
    gated: &'static str,
    entered: Barrier,
    released: Barrier,
    passed: AtomicBool,
}

impl GatedSource {
    fn new(inner: InMemoryClassSource, gated: &'static str) -> Self {
        Self {
            inner,
            gated,
            entered: Barrier::new(2),
            released: Barrier::new(2),
            passed: AtomicBool::new(false),
        }
    }
}

impl ClassSource for GatedSource {
    fn find_class(&self, name: &str) -> Option<ClassDefinition> {
        if name == self.gated && !self.passed.swap(true, Ordering::SeqCst) {
            self.entered.wait();
            self.released.wait();
        }
        self.inner.find_class(name)
    }
}

fn identity_class(name: &str) -> Vec<u8> {
    ClassFileBuilder::new(name).build()
}

fn source_with(classes: &[(&str, Vec<u8>)]) -> InMemoryClassSource {
    let _ = pretty_env_logger::try_init();

    let source = InMemoryClassSource::new();
    for (name, bytes) in classes {
        source.insert(*name, bytes.clone());
    }
    source
}

#[test]
fn test_preload_follows_declaration_order() {
    let source = Arc::new(RecordingSource {
        inner: source_with(&[
            (
                "my/Holder",
                fixtures::class_with_preload_attribute("my/Holder", &["my/B", "my/A"]),
            ),
            ("my/A", identity_class("my/A")),
            ("my/B", identity_class("my/B")),
        ]),
        ..Default::default()
    });
    let loader = ClassLoader::new(source.clone());

    loader.load_class("my/Holder").unwrap();

    assert_eq!(vec!["my/Holder", "my/B", "my/A"], source.requests());
}

#[test]
fn test_preload_of_a_loaded_class_is_a_no_op() {
    let source = Arc::new(RecordingSource {
        inner: source_with(&[
            (
                "my/Holder",
                fixtures::class_with_preload_attribute("my/Holder", &["my/A"]),
            ),
            ("my/A", identity_class("my/A")),
        ]),
        ..Default::default()
    });
    let loader = ClassLoader::new(source.clone());

    let a = loader.load_class("my/A").unwrap();
    loader.load_class("my/Holder").unwrap();

    assert_eq!(vec!["my/A", "my/Holder"], source.requests());
    assert!(Arc::ptr_eq(&a, &loader.find_loaded_class("my/A").unwrap()));
}

#[test]
fn test_classes_preloading_each_other() {
    let loader = ClassLoader::new(Arc::new(source_with(&[
        ("my/A", fixtures::class_with_preload_attribute("my/A", &["my/B"])),
        ("my/B", fixtures::class_with_preload_attribute("my/B", &["my/A"])),
    ])));

    loader.load_class("my/A").unwrap();

    assert!(loader.find_loaded_class("my/B").is_some());
}

#[test]
fn test_classes_preloading_each_other_from_two_threads() {
    let loader = ClassLoader::new(Arc::new(source_with(&[
        ("my/A", fixtures::class_with_preload_attribute("my/A", &["my/B"])),
        ("my/B", fixtures::class_with_preload_attribute("my/B", &["my/A"])),
    ])));
    let barrier = Arc::new(Barrier::new(2));

    let handles = ["my/A", "my/B"]
        .into_iter()
        .map(|name| {
            let loader = loader.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                loader.load_class(name).is_ok()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(loader.find_loaded_class("my/A").is_some());
    assert!(loader.find_loaded_class("my/B").is_some());
}

#[test]
fn test_concurrent_load_waits_for_preloading() {
    let source = Arc::new(GatedSource::new(
        source_with(&[
            ("my/A", fixtures::class_with_preload_attribute("my/A", &["my/X"])),
            ("my/X", identity_class("my/X")),
        ]),
        "my/X",
    ));
    let loader = ClassLoader::new(source.clone());

    let first = thread::spawn({
        let loader = loader.clone();
        move || loader.load_class("my/A").is_ok()
    });
    source.entered.wait();

    let second = thread::spawn({
        let loader = loader.clone();
        move || {
            let loaded = loader.load_class("my/A").is_ok();
            (loaded, loader.find_loaded_class("my/X").is_some())
        }
    });
    thread::sleep(Duration::from_millis(100));
    assert!(!second.is_finished());
    assert!(loader.find_loaded_class("my/A").is_none());

    source.released.wait();

    assert!(first.join().unwrap());
    assert_eq!((true, true), second.join().unwrap());
}

#[test]
fn test_missing_preload_class_fails_every_load() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Holder",
        fixtures::class_with_preload_attribute("my/Holder", &["my/Missing"]),
    )])));

    let first = loader.load_class("my/Holder").unwrap_err();
    let second = loader.load_class("my/Holder").unwrap_err();
    let third = loader.new_instance("my/Holder").unwrap_err();

    assert!(matches!(&first, VmError::NoClassDefFound(name) if name == "my/Missing"));
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.to_string(), third.to_string());
    assert!(loader.find_loaded_class("my/Holder").is_none());
}

#[test]
fn test_rejected_class_is_not_loaded() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Bad",
        fixtures::null_restricted_attribute_in_primitive_field("my/Bad"),
    )])));

    assert_eq!(
        loader.load_class("my/Bad").unwrap_err().kind(),
        ErrorKind::ClassFormatError
    );
    assert!(loader.find_loaded_class("my/Bad").is_none());
}

#[test]
fn test_class_with_the_wrong_name() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Expected",
        identity_class("my/Actual"),
    )])));

    assert_eq!(
        loader.load_class("my/Expected").unwrap_err().kind(),
        ErrorKind::NoClassDefFoundError
    );
}

#[test]
fn test_parent_loader_defines_first() {
    let parent = ClassLoader::builder()
        .name("platform")
        .build(Arc::new(source_with(&[("my/Shared", identity_class("my/Shared"))])));
    let child = ClassLoader::builder()
        .name("app")
        .parent(parent.clone())
        .build(Arc::new(source_with(&[
            ("my/Shared", identity_class("my/Shared")),
            ("my/Own", identity_class("my/Own")),
        ])));

    let shared = child.load_class("my/Shared").unwrap();
    let own = child.load_class("my/Own").unwrap();

    assert_eq!("platform", shared.defining_loader().unwrap().name());
    assert_eq!("app", own.defining_loader().unwrap().name());
    assert!(parent.find_loaded_class("my/Own").is_none());
}

#[test]
fn test_failed_initialization_is_not_retried() {
    let runs = Arc::new(AtomicUsize::new(0));
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Failing",
        fixtures::class_with_null_restricted_static_field("my/Failing", "my/Point"),
        ClassCode::new().with_static_initializer({
            let runs = runs.clone();
            move |class| {
                runs.fetch_add(1, Ordering::SeqCst);
                class.put_static("field", Value::Null)
            }
        }),
    );
    let loader = ClassLoader::new(Arc::new(source));

    let first = loader.initialize_class("my/Failing").unwrap_err();
    let second = loader.new_instance("my/Failing").unwrap_err();

    assert_eq!(1, runs.load(Ordering::SeqCst));
    assert_eq!(first.kind(), ErrorKind::ExceptionInInitializerError);
    assert_eq!(first.to_string(), second.to_string());
    assert!(std::ptr::eq(first.cause().unwrap(), second.cause().unwrap()));

    let class = loader.find_loaded_class("my/Failing").unwrap();
    assert!(matches!(class.init_state(), InitState::Failed(_)));
}

#[test]
fn test_failed_initialization_is_shared_across_threads() {
    let runs = Arc::new(AtomicUsize::new(0));
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Failing",
        fixtures::class_with_null_restricted_static_field("my/Failing", "my/Point"),
        ClassCode::new().with_static_initializer({
            let runs = runs.clone();
            move |class| {
                runs.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                class.put_static("field", Value::Null)
            }
        }),
    );
    let loader = ClassLoader::new(Arc::new(source));
    let barrier = Arc::new(Barrier::new(4));

    let errors = (0..4)
        .map(|_| {
            let loader = loader.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                loader.initialize_class("my/Failing").unwrap_err()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(1, runs.load(Ordering::SeqCst));
    let cause = errors[0].cause().unwrap();
    assert_eq!(cause.kind(), ErrorKind::NullPointerException);
    for err in &errors {
        assert_eq!(err.kind(), ErrorKind::ExceptionInInitializerError);
        assert!(std::ptr::eq(cause, err.cause().unwrap()));
    }
}

#[test]
fn test_panicking_initializer_fails_the_class() {
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Panicking",
        identity_class("my/Panicking"),
        ClassCode::new().with_static_initializer(|_| panic!("static initializer exploded")),
    );
    let loader = ClassLoader::new(Arc::new(source));

    let first = loader.initialize_class("my/Panicking").unwrap_err();

    assert_eq!(first.kind(), ErrorKind::InternalError);
    assert!(first.to_string().contains("static initializer exploded"));
    let class = loader.find_loaded_class("my/Panicking").unwrap();
    assert!(matches!(class.init_state(), InitState::Failed(_)));

    let second = thread::spawn({
        let loader = loader.clone();
        move || loader.initialize_class("my/Panicking").unwrap_err()
    })
    .join()
    .unwrap();
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_static_field_keeps_its_default_after_a_null_store() {
    let source = source_with(&[(
        "my/Statics",
        ClassFileBuilder::new("my/Statics")
            .field(FieldSpec::new(ACC_STATIC, "point", "Lmy/Point;").null_restricted())
            .field(FieldSpec::new(ACC_STATIC, "count", "J"))
            .build(),
    )]);
    let loader = ClassLoader::new(Arc::new(source));
    let class = loader.initialize_class("my/Statics").unwrap();

    let err = class.put_static("point", Value::Null).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NullPointerException);
    assert_eq!(Value::Uninitialized, class.get_static("point").unwrap());
    assert_eq!(Value::Long(0), class.get_static("count").unwrap());
}

#[test]
fn test_initialization_runs_once_across_threads() {
    let runs = Arc::new(AtomicUsize::new(0));
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Slow",
        ClassFileBuilder::new("my/Slow")
            .field(FieldSpec::new(ACC_STATIC, "counter", "I"))
            .build(),
        ClassCode::new().with_static_initializer({
            let runs = runs.clone();
            move |class| {
                runs.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                class.put_static("counter", Value::Int(42))
            }
        }),
    );
    let loader = ClassLoader::new(Arc::new(source));
    let barrier = Arc::new(Barrier::new(4));

    let handles = (0..4)
        .map(|_| {
            let loader = loader.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let class = loader.initialize_class("my/Slow").unwrap();
                class.get_static("counter").unwrap()
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(Value::Int(42), handle.join().unwrap());
    }
    assert_eq!(1, runs.load(Ordering::SeqCst));
}

#[test]
fn test_concurrent_loads_define_one_class() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Contended",
        identity_class("my/Contended"),
    )])));
    let barrier = Arc::new(Barrier::new(4));

    let classes = (0..4)
        .map(|_| {
            let loader = loader.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                loader.load_class("my/Contended").unwrap()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();

    assert!(classes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

fn nested_failure_loader(policy: InitializationPolicy) -> Arc<ClassLoader> {
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Inner",
        fixtures::class_with_null_restricted_static_field("my/Inner", "my/Point"),
        ClassCode::new().with_static_initializer(|class| class.put_static("field", Value::Null)),
    );
    source.insert_with_code(
        "my/Outer",
        identity_class("my/Outer"),
        ClassCode::new().with_static_initializer(|class| {
            let loader = class
                .defining_loader()
                .ok_or_else(|| VmError::Internal("loader is gone".into()))?;
            loader.initialize_class("my/Inner")?;
            Ok(())
        }),
    );
    ClassLoader::builder()
        .policy(policy)
        .build(Arc::new(source))
}

#[test]
fn test_nested_initializer_failure_propagates_unwrapped() {
    let loader = nested_failure_loader(InitializationPolicy::default());

    let err = loader.initialize_class("my/Outer").unwrap_err();

    assert!(matches!(&err, VmError::ExceptionInInitializer { class, .. } if class == "my/Inner"));
    assert_eq!(
        err.cause().map(VmError::kind),
        Some(ErrorKind::NullPointerException)
    );
}

#[test]
fn test_wrap_all_policy_wraps_nested_failures() {
    let loader = nested_failure_loader(InitializationPolicy::wrap_all());

    let err = loader.initialize_class("my/Outer").unwrap_err();

    assert!(matches!(&err, VmError::ExceptionInInitializer { class, .. } if class == "my/Outer"));
    assert_eq!(
        err.cause().map(VmError::kind),
        Some(ErrorKind::ExceptionInInitializerError)
    );
}

#[test]
fn test_host_exception_is_wrapped() {
    let source = source_with(&[]);
    source.insert_with_code(
        "my/Throwing",
        identity_class("my/Throwing"),
        ClassCode::new().with_static_initializer(|_| {
            Err(VmError::exception("java.lang.ArithmeticException", "/ by zero"))
        }),
    );
    let loader = ClassLoader::new(Arc::new(source));

    let err = loader.initialize_class("my/Throwing").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ExceptionInInitializerError);
    assert_eq!(
        err.cause().unwrap().to_string(),
        "java.lang.ArithmeticException: / by zero"
    );
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Shape",
        ClassFileBuilder::new("my/Shape")
            .access_flags(ACC_PUBLIC | ACC_ABSTRACT)
            .build(),
    )])));

    assert_eq!(
        loader.new_instance("my/Shape").unwrap_err().kind(),
        ErrorKind::InstantiationError
    );
}

#[test]
fn test_putfield_on_a_value_object_is_rejected() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Point",
        ClassFileBuilder::value_class("my/Point")
            .field(FieldSpec::new(ACC_FINAL, "x", "I"))
            .build(),
    )])));
    let point = loader.new_instance("my/Point").unwrap();

    assert_eq!(
        point.put_field("x", Value::Int(1)).unwrap_err().kind(),
        ErrorKind::IncompatibleClassChangeError
    );
    assert_eq!(Value::Int(0), point.get_field("x").unwrap());
}

#[test]
fn test_value_objects_compare_by_content() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Point",
        ClassFileBuilder::value_class("my/Point")
            .field(FieldSpec::new(ACC_FINAL, "x", "I"))
            .build(),
    )])));
    let origin = loader.new_instance("my/Point").unwrap();

    let a = origin.with_field("x", Value::Int(3)).unwrap();
    let b = origin.with_field("x", Value::Int(3)).unwrap();

    assert_eq!(Value::Reference(a.clone()), Value::Reference(b));
    assert_ne!(Value::Reference(a.clone()), Value::Reference(origin));

    let value = Value::from(a);
    assert!(!value.is_null());
    assert_eq!(
        Some(Value::Int(3)),
        value.as_reference().map(|point| point.get_field("x").unwrap())
    );
}

#[test]
fn test_unknown_field() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Empty",
        identity_class("my/Empty"),
    )])));
    let object = loader.new_instance("my/Empty").unwrap();

    assert!(matches!(
        object.get_field("missing"),
        Err(VmError::NoSuchField { field, .. }) if field == "missing"
    ));
}

#[test]
fn test_preload_attribute_is_exposed() {
    let loader = ClassLoader::new(Arc::new(source_with(&[
        (
            "my/Holder",
            ClassFileBuilder::new("my/Holder")
                .attribute(AttributeSpec::preload(["my/A"]))
                .build(),
        ),
        ("my/A", identity_class("my/A")),
    ])));

    let class = loader.load_class("my/Holder").unwrap();

    assert_eq!(["my/A"], class.preload_classes());
}

#[test]
fn test_class_structure_is_exposed() {
    let loader = ClassLoader::new(Arc::new(source_with(&[(
        "my/Line",
        ClassFileBuilder::value_class("my/Line")
            .field(FieldSpec::new(ACC_FINAL, "start", "Lmy/Point;").null_restricted())
            .field(FieldSpec::new(ACC_FINAL, "length", "D"))
            .build(),
    )])));

    let class = loader.load_class("my/Line").unwrap();

    assert_eq!(Some("java/lang/Object"), class.super_class_name());
    assert_eq!(
        vec!["start", "length"],
        class.fields().iter().map(Field::name).collect::<Vec<_>>()
    );
    let start = class.field("start").unwrap();
    assert!(start.is_null_restricted());
    assert!(start.access_flags().contains(AccessFlags::FINAL));
    assert_eq!(&FieldType::Object("my/Point".into()), start.field_type());
}
