//! LRA lifecycle tests against a mock participant over HTTP.

use std::time::Duration;

use lra_tck::lifecycle::controller::{CANCEL_STATUS, CLOSE_STATUS};
use lra_tck::{LraClientOps, LraError, TckContext};

mod common;

#[tokio::test]
async fn test_close_before_timeout_ends_once() {
    let (addr, participant) = common::start_participant().await;
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let lra = ops
        .start_lra(None, "LifecycleTests#t1", Duration::from_millis(300))
        .await
        .unwrap();
    ops.close_lra(&lra).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    let ends = participant.end_calls(lra.as_str());
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].coerce_status, CLOSE_STATUS);
    assert_eq!(ends[0].path, "/non-participant-tck-resource/end-lra");
    assert!(ops.background_errors().is_empty());

    ops.shutdown().await;
}

#[tokio::test]
async fn test_leaked_lra_cancelled_by_timer() {
    let (addr, participant) = common::start_participant().await;
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let lra = ops
        .start_lra(None, "LifecycleTests#t2", Duration::from_millis(1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let ends = participant.end_calls(lra.as_str());
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].coerce_status, CANCEL_STATUS);

    let errors = ops.background_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        LraError::PrematureTimeout { client_id, lra: timed_out }
            if client_id == "LifecycleTests#t2" && *timed_out == lra
    ));

    ops.shutdown().await;
}

#[tokio::test]
async fn test_nested_start_carries_parent_context() {
    let (addr, participant) = common::start_participant().await;
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let parent = ops.start_lra(None, "LifecycleTests#nested", Duration::ZERO).await.unwrap();
    let child = ops
        .start_lra(Some(&parent), "LifecycleTests#nested", Duration::ZERO)
        .await
        .unwrap();
    ops.cancel_lra(&child).await.unwrap();
    ops.close_lra(&parent).await.unwrap();

    let calls = participant.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0].path, "/non-participant-tck-resource/start-dont-end");
    assert!(calls[0].context.is_none());
    assert_eq!(calls[1].context.as_deref(), Some(parent.as_str()));
    assert_eq!(participant.end_calls(child.as_str())[0].coerce_status, CANCEL_STATUS);
    assert_eq!(participant.end_calls(parent.as_str())[0].coerce_status, CLOSE_STATUS);

    ops.shutdown().await;
}

#[tokio::test]
async fn test_clean_up_cancels_leaks() {
    let (addr, participant) = common::start_participant().await;
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let mut leaked = Vec::new();
    for n in 0..3 {
        let lra = ops
            .start_lra(None, &format!("LifecycleTests#leak{}", n), Duration::from_secs(60))
            .await
            .unwrap();
        leaked.push(lra);
    }
    assert_eq!(ops.pending_timers(), 3);

    assert_eq!(ops.clean_up("cleanUpTest").await, 3);
    assert_eq!(ops.pending_timers(), 0);
    for lra in &leaked {
        let ends = participant.end_calls(lra.as_str());
        assert_eq!(ends.len(), 1);
        assert_eq!(ends[0].coerce_status, CANCEL_STATUS);
    }

    ops.shutdown().await;
}

#[tokio::test]
async fn test_leave_lra() {
    let (addr, participant) = common::start_participant().await;
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let lra = ops.start_lra(None, "LifecycleTests#leave", Duration::ZERO).await.unwrap();
    let status = ops.leave_lra(&lra, "participant-tck-resource", "leave").await.unwrap();
    assert_eq!(status, 200);

    let leave = participant.calls().pop().unwrap();
    assert_eq!(leave.path, "/participant-tck-resource/leave");
    assert_eq!(leave.context.as_deref(), Some(lra.as_str()));

    ops.shutdown().await;
}

#[tokio::test]
async fn test_malformed_identity_over_http() {
    let (addr, participant) = common::start_participant().await;
    participant.answer_malformed();
    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();

    let err = ops
        .start_lra(None, "LifecycleTests#bad", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, LraError::MalformedIdentity { .. }));
    assert_eq!(ops.pending_timers(), 0);

    ops.shutdown().await;
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let ops = LraClientOps::from_config(&common::config_for(addr)).unwrap();
    let err = ops
        .start_lra(None, "LifecycleTests#down", Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, LraError::Transport(_)));

    ops.shutdown().await;
}

#[tokio::test]
async fn test_context_hooks() {
    let (addr, participant) = common::start_participant().await;
    let ctx = TckContext::before_http("LifecycleTests", "hooks", common::config_for(addr)).unwrap();
    let timeout = ctx.lra_timeout().unwrap();

    let closed = ctx.ops().start_lra(None, &ctx.client_id(), timeout).await.unwrap();
    ctx.ops().close_lra(&closed).await.unwrap();
    let leaked = ctx.ops().start_lra(None, &ctx.client_id(), timeout).await.unwrap();

    let report = ctx.after().await;
    assert_eq!(report.leaked, 1);
    assert!(report.background_errors.is_empty());
    assert_eq!(participant.end_calls(leaked.as_str())[0].coerce_status, CANCEL_STATUS);
    assert_eq!(participant.end_calls(closed.as_str()).len(), 1);
}
