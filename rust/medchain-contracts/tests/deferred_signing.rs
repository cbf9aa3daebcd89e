mod common;

use common::*;
use medchain_common::{Blake3Hash, from_cbor, to_cbor};
use medchain_contracts::{QueryId, QueryStatus, deferred::DeferredProposal};
use medchain_credentials::{Authority, Ed25519Signer, Principal};
use medchain_ledger::{Arguments, Block, InstanceId, Instruction, MedchainLedgerError, MemoryLedger};
use pretty_assertions::assert_eq;
use testresult::TestResult;

fn propose(
    ledger: &MemoryLedger,
    fixture: &ProjectFixture,
    by: &Ed25519Signer,
    proposed: &Instruction,
    required: &[&Ed25519Signer],
    expire_at: u64,
) -> anyhow::Result<InstanceId> {
    let required = required
        .iter()
        .map(|signer| signer.identity().to_string())
        .collect::<Vec<_>>()
        .join(",");
    let spawn = Instruction::spawn(
        InstanceId::darc(&fixture.darc),
        "deferred",
        Arguments::new()
            .with("instruction", to_cbor(proposed)?)
            .with("required", required)
            .with("expire_at", expire_at.to_string()),
    );
    Ok(created(&submit(ledger, &[by], vec![spawn])?))
}

fn proposal(ledger: &MemoryLedger, id: &InstanceId) -> anyhow::Result<DeferredProposal> {
    Ok(from_cbor(&ledger.instance(id)?.value)?)
}

fn co_sign(
    ledger: &MemoryLedger,
    id: InstanceId,
    hash: &Blake3Hash,
    submitter: &Ed25519Signer,
    signer: &Ed25519Signer,
) -> Result<Block, MedchainLedgerError> {
    let signature = signer.sign(hash.as_ref())?;
    let add = Instruction::invoke(
        id,
        "deferred",
        "add_signature",
        Arguments::new()
            .with("identity", signer.identity().to_string())
            .with("signature", signature),
    );
    submit(ledger, &[submitter], vec![add])
}

fn execute(
    ledger: &MemoryLedger,
    id: InstanceId,
    submitter: &Ed25519Signer,
) -> Result<Block, MedchainLedgerError> {
    submit(
        ledger,
        &[submitter],
        vec![Instruction::invoke(id, "deferred", "execute", Arguments::new())],
    )
}

fn grant(fixture: &ProjectFixture) -> Instruction {
    Instruction::invoke(
        fixture.project,
        "project",
        "add",
        Arguments::new()
            .with("user", "carol")
            .with("actions", "count_global"),
    )
}

#[test_log::test]
fn it_executes_once_every_required_identity_signed() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let id = propose(&ledger, &a, &k, &grant(&a), &[&root, &k], 100)?;
    let hash = proposal(&ledger, &id)?.digest;

    co_sign(&ledger, id, &hash, &k, &root)?;
    assert!(!proposal(&ledger, &id)?.is_ready());
    assert!(matches!(
        execute(&ledger, id, &k),
        Err(MedchainLedgerError::NotReady(_))
    ));

    co_sign(&ledger, id, &hash, &k, &k)?;
    assert!(proposal(&ledger, &id)?.is_ready());

    let block = execute(&ledger, id, &k)?;
    assert_eq!(block.changes().count(), 2);
    assert!(project_state(&ledger, &a.project)?.is_allowed("carol", "count_global"));
    assert!(proposal(&ledger, &id)?.executed);

    assert!(matches!(
        execute(&ledger, id, &root),
        Err(MedchainLedgerError::AlreadyExecuted(_))
    ));
    Ok(())
}

#[test_log::test]
fn it_denies_unrequired_and_repeated_signatures() -> TestResult {
    let (root, k, x) = (signer(1), signer(2), signer(3));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let id = propose(&ledger, &a, &root, &grant(&a), &[&root], 100)?;
    let hash = proposal(&ledger, &id)?.digest;

    assert!(matches!(
        co_sign(&ledger, id, &hash, &k, &x),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(matches!(
        co_sign(&ledger, id, &Blake3Hash::hash(b"other"), &k, &root),
        Err(MedchainLedgerError::Denied(_))
    ));

    co_sign(&ledger, id, &hash, &k, &root)?;
    assert!(matches!(
        co_sign(&ledger, id, &hash, &k, &root),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert_eq!(proposal(&ledger, &id)?.signatures.len(), 1);
    Ok(())
}

#[test_log::test]
fn collected_signers_must_satisfy_the_target_rule() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let id = propose(&ledger, &a, &k, &grant(&a), &[&k], 100)?;
    let hash = proposal(&ledger, &id)?.digest;
    co_sign(&ledger, id, &hash, &k, &k)?;

    assert!(matches!(
        execute(&ledger, id, &k),
        Err(MedchainLedgerError::Denied(_))
    ));
    assert!(!proposal(&ledger, &id)?.executed);
    assert!(!project_state(&ledger, &a.project)?.is_allowed("carol", "count_global"));
    Ok(())
}

#[test_log::test]
fn a_deferred_decide_uses_the_collected_signers() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:A:count_global")])?;
    let decide = query(a.store, "decide", "q1:A:count_global");
    let id = propose(&ledger, &a, &k, &decide, &[&k], 100)?;
    let hash = proposal(&ledger, &id)?.digest;
    co_sign(&ledger, id, &hash, &k, &k)?;
    execute(&ledger, id, &root)?;

    let state = queries(&ledger, &a.store)?;
    let q1 = "q1:A:count_global".parse::<QueryId>()?;
    assert_eq!(state.queries.get(&q1).map(|query| query.status), Some(QueryStatus::Authorized));
    Ok(())
}

#[test_log::test]
fn proposals_go_inert_at_their_expiry_height() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let expire_at = ledger.latest_block()?.index + 3;
    let id = propose(&ledger, &a, &k, &grant(&a), &[&root], expire_at)?;
    let hash = proposal(&ledger, &id)?.digest;

    submit(&ledger, &[&k], vec![query(a.store, "submit", "q1:A:count_global")])?;
    submit(&ledger, &[&k], vec![query(a.store, "submit", "q2:A:count_global")])?;

    assert!(matches!(
        co_sign(&ledger, id, &hash, &k, &root),
        Err(MedchainLedgerError::Expired(_))
    ));
    assert!(matches!(
        execute(&ledger, id, &k),
        Err(MedchainLedgerError::Expired(_))
    ));
    Ok(())
}

#[test_log::test]
fn proposals_need_required_identities() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let result = propose(&ledger, &a, &k, &grant(&a), &[], 100);
    let error = result.unwrap_err().downcast::<MedchainLedgerError>()?;
    assert!(matches!(error, MedchainLedgerError::InvalidArgument(_)));
    Ok(())
}

#[test_log::test]
fn signatures_cannot_be_replayed_onto_another_proposal() -> TestResult {
    let (root, k) = (signer(1), signer(2));
    let ledger = start(&root)?;
    let a = project(&ledger, &root, &k, "A")?;

    let first = propose(&ledger, &a, &k, &grant(&a), &[&root, &k], 100)?;
    let digest = proposal(&ledger, &first)?.digest;
    co_sign(&ledger, first, &digest, &k, &root)?;
    co_sign(&ledger, first, &digest, &k, &k)?;
    execute(&ledger, first, &k)?;

    let revoke = Instruction::invoke(
        a.project,
        "project",
        "remove",
        Arguments::new()
            .with("user", "carol")
            .with("action", "count_global"),
    );
    submit(&ledger, &[&root], vec![revoke])?;
    assert!(!project_state(&ledger, &a.project)?.is_allowed("carol", "count_global"));

    let second = propose(&ledger, &a, &k, &grant(&a), &[&root, &k], 100)?;
    assert_ne!(second, first);
    let pending = proposal(&ledger, &second)?;
    assert_eq!(pending.instruction_hash, proposal(&ledger, &first)?.instruction_hash);
    assert_ne!(pending.digest, digest);

    let copied = proposal(&ledger, &first)?.signatures[&root.identity()].clone();
    let replay = Instruction::invoke(
        second,
        "deferred",
        "add_signature",
        Arguments::new()
            .with("identity", root.identity().to_string())
            .with("signature", copied.into_vec()),
    );
    assert!(matches!(
        submit(&ledger, &[&k], vec![replay]),
        Err(MedchainLedgerError::Denied(_))
    ));

    co_sign(&ledger, second, &pending.digest, &k, &k)?;
    assert!(matches!(
        execute(&ledger, second, &k),
        Err(MedchainLedgerError::NotReady(_))
    ));
    assert!(!project_state(&ledger, &a.project)?.is_allowed("carol", "count_global"));
    Ok(())
}
