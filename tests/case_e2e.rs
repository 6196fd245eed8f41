//! End-to-end behavior of the layered store over an in-memory backend.

use std::sync::Arc;

use casekit::{
    Case, CaseConfig, CaseError, ComponentClass, ConfigureRequest, Entry, GetOptions,
    MachineSpec, MemoryBackend, PeLayout, SetOptions, StaticDefaults, StaticTemplates,
    StoreBackend, StoreDocument, StoreKind, TemplateRow, Value, ValueType,
};

const ROOT: &str = "/cases/b1850";

fn seeded_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    let root = std::path::Path::new(ROOT);
    let docs = [
        (
            StoreKind::Case,
            vec![
                Entry::new("CASE", ValueType::Char).with_value("b1850"),
                Entry::new("CASEROOT", ValueType::Char).with_value(ROOT),
                Entry::new("STOP_N", ValueType::Int).with_value("3"),
            ],
        ),
        (
            StoreKind::Run,
            vec![
                Entry::new("STOP_N", ValueType::Int).with_value("5"),
                Entry::new("RUNDIR", ValueType::Char).with_value("${CASEROOT}/run"),
                Entry::new("CONTINUE_RUN", ValueType::Bool).with_value("TRUE"),
                Entry::new("RESUBMIT", ValueType::Int).with_value("4"),
            ],
        ),
        (StoreKind::Build, vec![]),
        (StoreKind::MachPes, vec![]),
        (StoreKind::Batch, vec![]),
    ];
    for (kind, entries) in docs {
        backend
            .insert(root.join(kind.file_name()), StoreDocument::new(kind, entries))
            .unwrap();
    }
    backend
}

fn open(backend: &Arc<MemoryBackend>, config: CaseConfig) -> Case {
    Case::open(ROOT, backend.clone(), config).unwrap()
}

fn machine() -> MachineSpec {
    MachineSpec {
        name: "cluster".to_string(),
        pes_per_node: 16,
        max_tasks_per_node: 32,
        ..MachineSpec::default()
    }
}

#[test]
fn earlier_store_shadows_later_one() {
    let backend = seeded_backend();
    let case = open(&backend, CaseConfig::default());

    assert_eq!(case.get_int("STOP_N").unwrap(), Some(3));
    let run = case.store(StoreKind::Run).unwrap();
    assert_eq!(run.get_raw("STOP_N", None, None).as_deref(), Some("5"));
}

#[test]
fn set_only_touches_owning_store() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());

    let mut txn = case.begin().unwrap();
    txn.set("STOP_N", 9).unwrap();
    assert_eq!(txn.dirty_stores(), vec![StoreKind::Case]);
    assert_eq!(txn.commit().unwrap(), 1);

    assert_eq!(case.get_int("STOP_N").unwrap(), Some(9));
    let run = case.store(StoreKind::Run).unwrap();
    assert_eq!(run.get_raw("STOP_N", None, None).as_deref(), Some("5"));
    assert_eq!(
        backend.written_paths().unwrap(),
        vec![std::path::Path::new(ROOT).join("env_case.store")]
    );
}

#[test]
fn second_flush_writes_nothing() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());

    let mut txn = case.begin().unwrap();
    txn.set("RESUBMIT", 1).unwrap();
    assert_eq!(txn.flush(false).unwrap(), 1);
    assert_eq!(txn.flush(false).unwrap(), 0);
    drop(txn);

    assert_eq!(backend.write_count().unwrap(), 1);
}

#[test]
fn flush_all_rewrites_every_store() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    // five typed stores plus two auxiliary ones
    assert_eq!(case.flush(true).unwrap(), 7);
    assert!(!case.is_dirty());
}

#[test]
fn flushed_values_survive_reopen() {
    let backend = seeded_backend();
    {
        let mut case = open(&backend, CaseConfig::default());
        let mut txn = case.begin().unwrap();
        txn.set("STOP_N", 12).unwrap();
        txn.commit().unwrap();
    }
    let reopened = open(&backend, CaseConfig::read_only());
    assert_eq!(reopened.get_int("STOP_N").unwrap(), Some(12));
}

#[test]
fn reload_picks_up_external_writes() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    let mut other = open(&backend, CaseConfig::default());

    other.begin().unwrap().set("STOP_N", 1).unwrap();
    assert_eq!(case.get_int("STOP_N").unwrap(), Some(3));
    case.reload().unwrap();
    assert_eq!(case.get_int("STOP_N").unwrap(), Some(1));
}

#[test]
fn reload_reports_dirty_files() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    let mut copy = case.copy("other", "/cases/other").unwrap();

    let err = copy.reload().unwrap_err();
    match err {
        CaseError::DirtyReloadRejected { files } => assert!(files.contains("env_case.store")),
        other => panic!("unexpected error: {other}"),
    }
    case.reload().unwrap();
}

#[test]
fn read_only_case_refuses_writes() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::read_only());

    assert!(case.begin().unwrap_err().is_read_only());
    assert!(case.flush(true).unwrap_err().is_read_only());
    assert_eq!(case.flush(false).unwrap(), 0);
}

#[test]
fn undefined_key_and_validation_errors() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    let mut txn = case.begin().unwrap();

    assert!(txn.set("NOT_A_KEY", 1).unwrap_err().is_undefined_key());
    let err = txn.set("STOP_N", "soon").unwrap_err();
    assert!(matches!(err, CaseError::TypeMismatch { .. }));

    let opts = SetOptions {
        ignore_type: true,
        ..SetOptions::default()
    };
    assert!(txn.set_with("STOP_N", "soon", opts).unwrap());
    assert!(matches!(txn.get("STOP_N").unwrap_err(), CaseError::TypeMismatch { .. }));
}

#[test]
fn clones_are_independent() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    let snapshot = case.clone();

    case.begin().unwrap().set("STOP_N", 40).unwrap();
    assert_eq!(case.get_int("STOP_N").unwrap(), Some(40));
    assert_eq!(snapshot.get_int("STOP_N").unwrap(), Some(3));
}

#[test]
fn copy_retargets_and_resets_run_state() {
    let backend = seeded_backend();
    let case = open(&backend, CaseConfig::default());
    let mut copy = case.copy("b1850.branch", "/cases/branch").unwrap();

    assert_eq!(copy.root(), std::path::Path::new("/cases/branch"));
    assert_eq!(copy.get_string("CASE").unwrap().as_deref(), Some("b1850.branch"));
    assert_eq!(copy.get_string("RUNDIR").unwrap().as_deref(), Some("/cases/branch/run"));
    assert_eq!(copy.get_bool("CONTINUE_RUN").unwrap(), Some(false));
    assert_eq!(copy.get_int("RESUBMIT").unwrap(), Some(0));

    // the source case is untouched
    assert_eq!(case.get_string("CASE").unwrap().as_deref(), Some("b1850"));
    assert_eq!(case.get_bool("CONTINUE_RUN").unwrap(), Some(true));

    let written = copy.flush(false).unwrap();
    assert_eq!(written, 7);
    assert!(backend.exists(std::path::Path::new("/cases/branch/env_run.store")).unwrap());
}

#[test]
fn lookups_wait_for_owner() {
    let backend = seeded_backend();
    let mut case = open(&backend, CaseConfig::default());
    let mut txn = case.begin().unwrap();

    assert!(!txn
        .set_with("JOB_QUEUE", "regular", SetOptions::allow_undefined())
        .unwrap());
    txn.set_lookup_value("JOB_QUEUE", "debug");
    assert_eq!(txn.pending_lookups()["JOB_QUEUE"], Value::from("regular"));
    assert_eq!(txn.drain_lookups().unwrap(), 0);

    txn.add_entry(StoreKind::Batch, Entry::new("JOB_QUEUE", ValueType::Char))
        .unwrap();
    assert_eq!(txn.drain_lookups().unwrap(), 1);
    assert_eq!(txn.get_string("JOB_QUEUE").unwrap().as_deref(), Some("regular"));
}

#[test]
fn configure_writes_layout_and_recomputes() {
    let backend = Arc::new(MemoryBackend::new());
    let mut case = Case::create("/cases/new", backend.clone(), CaseConfig::default()).unwrap();
    let classes = vec![
        ComponentClass::Cpl,
        ComponentClass::Atm,
        ComponentClass::Lnd,
        ComponentClass::Ocn,
    ];

    let mut layout = PeLayout::default();
    for class in &classes {
        layout.ntasks.insert(*class, -2);
    }
    layout.rootpe.insert(ComponentClass::Ocn, -2);
    layout.other.insert("STOP_OPTION".to_string(), "nmonths".to_string());
    let templates = StaticTemplates::new(vec![TemplateRow {
        grid: Some("f19".to_string()),
        layout,
        ..TemplateRow::default()
    }]);

    let plan = {
        let mut txn = case.begin().unwrap();
        let request = ConfigureRequest::new("B1850", "f19_g16", classes.clone());
        let plan = txn
            .configure(&request, &StaticDefaults::standard(), &templates, &machine())
            .unwrap();
        assert!(txn.commit().unwrap() >= 5);
        plan
    };

    assert_eq!(case.get_int("NTASKS_ATM").unwrap(), Some(32));
    assert_eq!(case.get_int("ROOTPE_OCN").unwrap(), Some(32));
    assert_eq!(case.get_int("TOTALPES").unwrap(), Some(64));
    assert_eq!(case.get_string("STOP_OPTION").unwrap().as_deref(), Some("nmonths"));
    assert_eq!(case.get_string("MACH").unwrap().as_deref(), Some("cluster"));
    assert_eq!(case.component_classes().unwrap(), classes);
    assert_eq!(plan.nodes.num_nodes, 2);

    let recomputed = case.resource_plan(&machine()).unwrap();
    assert_eq!(recomputed.assignments, plan.assignments);
    assert_eq!(recomputed.nodes, plan.nodes);

    let reopened = Case::open("/cases/new", backend, CaseConfig::read_only()).unwrap();
    assert_eq!(reopened.get_int("NTASKS_LND").unwrap(), Some(32));
}

#[test]
fn per_component_values_read_by_attribute() {
    let backend = Arc::new(MemoryBackend::new());
    let mut case = Case::create("/cases/pc", backend, CaseConfig::default()).unwrap();
    let mut txn = case.begin().unwrap();
    txn.add_entry(
        StoreKind::MachPes,
        Entry::new("NTASKS", ValueType::Int).with_value("1").per_component(),
    )
    .unwrap();
    txn.set("NTASKS_OCN", 24).unwrap();

    assert_eq!(txn.get_int("NTASKS_OCN").unwrap(), Some(24));
    assert_eq!(txn.get_int("NTASKS_ATM").unwrap(), Some(1));
    let by_attr = txn
        .get_with("NTASKS", GetOptions::default().attribute("OCN"))
        .unwrap();
    assert_eq!(by_attr, Some(Value::Int(24)));
}

#[test]
fn bare_component_key_sets_every_component() {
    let backend = Arc::new(MemoryBackend::new());
    let mut case = Case::create("/cases/all", backend, CaseConfig::default()).unwrap();
    let mut txn = case.begin().unwrap();
    let request = ConfigureRequest::new("X", "f45", vec![ComponentClass::Cpl, ComponentClass::Atm])
        .with_size_spec("4x1");
    txn.configure(&request, &StaticDefaults::standard(), &StaticTemplates::default(), &machine())
        .unwrap();
    assert_eq!(txn.get_int("NTASKS_ATM").unwrap(), Some(4));

    txn.set("NTASKS", 8).unwrap();
    assert_eq!(txn.get_int("NTASKS_ATM").unwrap(), Some(8));
    assert_eq!(txn.get_int("NTASKS_CPL").unwrap(), Some(8));
    assert_eq!(txn.get_int("NTASKS").unwrap(), Some(8));

    // a composite id still touches only its own component
    txn.set("NTASKS_ATM", 16).unwrap();
    assert_eq!(txn.get_int("NTASKS_ATM").unwrap(), Some(16));
    assert_eq!(txn.get_int("NTASKS_CPL").unwrap(), Some(8));
}
