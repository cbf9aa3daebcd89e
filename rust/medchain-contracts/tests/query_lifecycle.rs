mod common;

use common::*;
use medchain_contracts::{QueryId, QueryStatus};
use medchain_credentials::Principal;
use medchain_ledger::{Arguments, Instruction, MedchainLedgerError};
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn status_of(
    ledger: &medchain_ledger::MemoryLedger,
    fixture: &ProjectFixture,
    id: &str,
) -> anyhow::Result<Option<QueryStatus>> {
    let state = queries(ledger, &fixture.store)?;
    Ok(state
        .queries
        .get(&id.parse::<QueryId>()?)
        .map(|query| query.status))
}

#[test_log::test]
fn it_authorizes_only_granted_actions() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:A:count_global")])?;
    submit(&ledger, &[&k], vec![query(a.store, "submit", "q2:A:patient_list")])?;
    assert_eq!(status_of(&ledger, &a, "q1:A:count_global")?, Some(QueryStatus::Submitted));

    submit(&ledger, &[&k], vec![query(a.store, "decide", "q1:A:count_global")])?;
    submit(&ledger, &[&k], vec![query(a.store, "decide", "q2:A:patient_list")])?;

    assert_eq!(status_of(&ledger, &a, "q1:A:count_global")?, Some(QueryStatus::Authorized));
    assert_eq!(status_of(&ledger, &a, "q2:A:patient_list")?, Some(QueryStatus::Rejected));
    Ok(())
}

#[test_log::test]
fn it_rejects_when_any_signer_is_unauthorized() -> TestResult {
    let (root, k, x, y) = (signer(1), signer(2), signer(3), signer(4));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:A:count_global")])?;
    submit(&ledger, &[&x, &y], vec![query(a.store, "decide", "q1:A:count_global")])?;
    assert_eq!(status_of(&ledger, &a, "q1:A:count_global")?, Some(QueryStatus::Rejected));

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q3:A:count_global")])?;
    submit(&ledger, &[&k, &x], vec![query(a.store, "decide", "q3:A:count_global")])?;
    assert_eq!(status_of(&ledger, &a, "q3:A:count_global")?, Some(QueryStatus::Rejected));
    Ok(())
}

#[test_log::test]
fn deciding_twice_keeps_a_single_record() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q2:A:patient_list")])?;
    for _ in 0..2 {
        submit(&ledger, &[&k], vec![query(a.store, "decide", "q2:A:patient_list")])?;
        assert_eq!(status_of(&ledger, &a, "q2:A:patient_list")?, Some(QueryStatus::Rejected));
    }
    assert_eq!(queries(&ledger, &a.store)?.queries.len(), 1);
    Ok(())
}

#[test_log::test]
fn decide_records_queries_that_were_never_submitted() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "decide", "q7:A:count_global")])?;
    assert_eq!(status_of(&ledger, &a, "q7:A:count_global")?, Some(QueryStatus::Authorized));
    Ok(())
}

#[test_log::test]
fn it_refuses_illegal_transitions() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q2:A:patient_list")])?;
    submit(&ledger, &[&k], vec![query(a.store, "decide", "q2:A:patient_list")])?;

    let revive = Instruction::invoke(
        a.store,
        "medchain",
        "update",
        Arguments::new()
            .with("query", "q2:A:patient_list")
            .with("status", "Authorized"),
    );
    assert!(matches!(
        submit(&ledger, &[&root], vec![revive]),
        Err(MedchainLedgerError::InvalidTransition(_))
    ));

    let again = query(a.store, "submit", "q2:A:patient_list");
    assert!(matches!(
        submit(&ledger, &[&k], vec![again]),
        Err(MedchainLedgerError::InvalidArgument(_))
    ));
    assert_eq!(status_of(&ledger, &a, "q2:A:patient_list")?, Some(QueryStatus::Rejected));
    Ok(())
}

#[test_log::test]
fn query_actions_record_execution_for_granted_users() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:A:count_global")])?;
    submit(&ledger, &[&k], vec![query(a.store, "decide", "q1:A:count_global")])?;

    let run = |command: &str, id: &str| {
        Instruction::invoke(
            a.store,
            "medchain",
            command,
            Arguments::new().with("query", id).with("status", "Executed"),
        )
    };

    assert!(matches!(
        submit(&ledger, &[&root], vec![run("count_global", "q1:A:count_global")]),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(matches!(
        submit(&ledger, &[&k], vec![run("patient_list", "q1:A:count_global")]),
        Err(MedchainLedgerError::Denied(_))
    ));

    submit(&ledger, &[&k], vec![run("count_global", "q1:A:count_global")])?;
    assert_eq!(status_of(&ledger, &a, "q1:A:count_global")?, Some(QueryStatus::Executed));
    Ok(())
}

#[test_log::test]
fn verify_status_accepts_only_authorized_queries() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![
        query(a.store, "submit", "q1:A:count_global"),
        query(a.store, "submit", "q2:A:patient_list"),
        query(a.store, "decide", "q1:A:count_global"),
        query(a.store, "decide", "q2:A:patient_list"),
    ])?;

    let block = submit(&ledger, &[&k], vec![query(a.store, "verify_status", "q1:A:count_global")])?;
    assert_eq!(block.changes().count(), 0);

    assert!(matches!(
        submit(&ledger, &[&k], vec![query(a.store, "verify_status", "q2:A:patient_list")]),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(matches!(
        submit(&ledger, &[&k], vec![query(a.store, "verify_status", "q9:A:count_global")]),
        Err(MedchainLedgerError::NotFound(_))
    ));
    Ok(())
}

#[test_log::test]
fn stores_only_accept_their_own_project() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    assert!(matches!(
        submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:B:count_global")]),
        Err(MedchainLedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        submit(&ledger, &[&k], vec![query(a.store, "submit", "not-a-query")]),
        Err(MedchainLedgerError::InvalidArgument(_))
    ));
    Ok(())
}

#[test_log::test]
fn queries_and_projects_are_never_deleted() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    assert!(matches!(
        submit(&ledger, &[&root], vec![Instruction::delete(a.store, "medchain")]),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(matches!(
        submit(&ledger, &[&root], vec![Instruction::delete(a.project, "project")]),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(ledger.instance(&a.store).is_ok());
    Ok(())
}

#[test_log::test]
fn project_authorizations_follow_add_and_remove() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let add = Instruction::invoke(
        a.project,
        "project",
        "add",
        Arguments::new()
            .with("user", "alice")
            .with("actions", "count_global, patient_list"),
    );
    let remove = Instruction::invoke(
        a.project,
        "project",
        "remove",
        Arguments::new().with("user", "alice").with("action", "patient_list"),
    );

    assert!(matches!(
        submit(&ledger, &[&k], vec![add.clone()]),
        Err(MedchainLedgerError::Denied(_))
    ));

    submit(&ledger, &[&root], vec![add])?;
    let project = project_state(&ledger, &a.project)?;
    assert_eq!(project.name, "A");
    assert_eq!(project.description, "study A");
    assert!(project.is_allowed("alice", "patient_list"));

    submit(&ledger, &[&root], vec![remove])?;
    let project = project_state(&ledger, &a.project)?;
    assert!(project.is_allowed("alice", "count_global"));
    assert!(!project.is_allowed("alice", "patient_list"));
    Ok(())
}

#[test_log::test]
fn decide_authorizes_exactly_when_every_signer_is_granted() -> TestResult {
    use rand::{Rng, thread_rng as rng};

    let (root, k, x) = (signer(1), signer(2), signer(3));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;
    let candidates = [&root, &k, &x];

    for round in 0..16 {
        let mut signers = candidates
            .iter()
            .copied()
            .filter(|_| rng().gen_bool(0.5))
            .collect::<Vec<_>>();
        if signers.is_empty() {
            signers.push(candidates[rng().gen_range(0..candidates.len())]);
        }

        let id = format!("r{round}:A:count_global");
        submit(&ledger, &signers, vec![query(a.store, "decide", &id)])?;

        let expected = if signers.iter().all(|signer| signer.identity() == k.identity()) {
            QueryStatus::Authorized
        } else {
            QueryStatus::Rejected
        };
        assert_eq!(status_of(&ledger, &a, &id)?, Some(expected), "signers: {}", signers.len());
    }
    Ok(())
}
