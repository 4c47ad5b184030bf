use super::*;
use crate::data_transfer::testing::{sample_rows, FakeConnector, FakeSession};

fn session(connector: &FakeConnector, engine: EngineKind) -> FakeSession {
    FakeSession {
        engine,
        state: connector.state.clone(),
    }
}

#[tokio::test]
async fn test_fetch_returns_first_result_unchanged() {
    let connector = FakeConnector::new().with_result("ap_scheduled_data", sample_rows(3));
    let mut session = session(&connector, EngineKind::MySQL);

    let result = call_procedure(&mut session, "ap_scheduled_data", EngineKind::MySQL, true)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, sample_rows(3));
    assert_eq!(connector.statements(), vec!["CALL ap_scheduled_data()"]);
    assert!(connector.committed().is_empty());
}

#[tokio::test]
async fn test_procedure_without_rows_yields_empty_result() {
    let connector = FakeConnector::new();
    let mut session = session(&connector, EngineKind::MySQL);

    let result = call_procedure(&mut session, "ap_scheduled_data", EngineKind::MySQL, true)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn test_fire_and_forget_call_is_committed() {
    let connector = FakeConnector::new();
    let mut session = session(&connector, EngineKind::MSSQL);

    let result = call_procedure(
        &mut session,
        "dbo.ap_scheduled_data_import",
        EngineKind::MSSQL,
        false,
    )
    .await
    .unwrap();

    assert!(result.is_none());
    assert_eq!(connector.statements(), vec!["EXEC dbo.ap_scheduled_data_import"]);
    assert_eq!(connector.committed(), vec!["dbo.ap_scheduled_data_import"]);
}

#[tokio::test]
async fn test_invalid_name_never_reaches_session() {
    let connector = FakeConnector::new();
    let mut session = session(&connector, EngineKind::MySQL);

    for name in ["", "drop table x; --", "a.b.c"] {
        let err = call_procedure(&mut session, name, EngineKind::MySQL, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution");
    }
    assert!(connector.statements().is_empty());
}

#[tokio::test]
async fn test_engine_mismatch_is_execution_error() {
    let connector = FakeConnector::new();
    let mut session = session(&connector, EngineKind::MSSQL);

    let err = call_procedure(&mut session, "ap_scheduled_data", EngineKind::MySQL, true)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Engine mismatch"));
    assert!(connector.statements().is_empty());
}

#[tokio::test]
async fn test_driver_failure_names_procedure() {
    let connector = FakeConnector::new().failing_procedure("ap_scheduled_data");
    let mut session = session(&connector, EngineKind::MySQL);

    let err = call_procedure(&mut session, "ap_scheduled_data", EngineKind::MySQL, true)
        .await
        .unwrap_err();

    match err {
        TransferError::Execution { procedure, message } => {
            assert_eq!(procedure, "ap_scheduled_data");
            assert!(message.contains("does not exist"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
