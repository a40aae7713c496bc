#[cfg(test)]
mod tests {
    use crate::{
        config::RestoreConfig,
        error::SinkError,
        sink::OutputSink,
        tests::{build_sink, committed_ids, mock::MockStore, user, users_config},
    };
    use connectors::sql::base::{connection::DatabaseKind, metadata::column::ColumnSpec};
    use model::{core::value::Value, records::row::RowData};
    use tracing_test::traced_test;

    // Test Settings: RESTORE on column id.
    // Scenario: Three rows are committed and the restore value changes on the last one.
    // Expected Outcome:
    // - The cursor holds the restore value of the last committed row.
    // - An immediate second snapshot returns nothing.
    #[traced_test]
    #[tokio::test]
    async fn test_cursor_follows_last_committed_row() {
        let store = MockStore::new();
        let config =
            users_config(DatabaseKind::Postgres).with_restore(RestoreConfig::on_column("id"));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        sink.write_batch(vec![user(1, "a"), user(1, "b"), user(2, "c")])
            .await
            .unwrap();

        let cursor = sink.snapshot().await.unwrap().expect("cursor after value change");
        assert_eq!(cursor.value, Value::Int(2));
        assert_eq!(cursor.rows_in_interval, 3);
        assert_eq!(cursor.rows_total, 3);

        assert!(sink.snapshot().await.unwrap().is_none());
        assert_eq!(sink.metrics().snapshot().checkpoint_count, 1);

        let json = serde_json::to_value(&cursor).unwrap();
        assert_eq!(json["rows_total"], 3);
    }

    // Test Settings: RESTORE on column id.
    // Scenario: Committed rows all share one restore value.
    // Expected Outcome: No cursor is emitted yet.
    #[traced_test]
    #[tokio::test]
    async fn test_no_cursor_while_value_unchanged() {
        let store = MockStore::new();
        let config =
            users_config(DatabaseKind::MySql).with_restore(RestoreConfig::on_column("id"));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        assert!(sink.snapshot().await.unwrap().is_none());

        sink.write_batch(vec![user(5, "a"), user(5, "b")])
            .await
            .unwrap();
        assert!(sink.snapshot().await.unwrap().is_none());
        assert!(logs_contain("Checkpoint not ready"));
    }

    // Test Settings: RESTORE on column id, MAX_ROWS_PER_CHECKPOINT = 2.
    // Scenario:
    // - Two rows sharing one restore value are committed; the threshold is reached but not exceeded.
    // - A third committed row exceeds it and a fourth is still buffered.
    // Expected Outcome: The snapshot flushes the buffered row before the cursor is taken.
    #[traced_test]
    #[tokio::test]
    async fn test_snapshot_flushes_pending_rows() {
        let store = MockStore::new();
        let config = users_config(DatabaseKind::Postgres)
            .with_restore(RestoreConfig::on_column("id").with_max_rows(2));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        sink.write_batch(vec![user(1, "a"), user(1, "b")])
            .await
            .unwrap();
        assert!(sink.snapshot().await.unwrap().is_none());

        sink.write_batch(vec![user(1, "c")]).await.unwrap();
        sink.write(user(1, "d")).await.unwrap();
        assert_eq!(store.committed().len(), 3);

        let cursor = sink.snapshot().await.unwrap().expect("cursor after max rows");
        assert_eq!(store.committed().len(), 4);
        assert_eq!(cursor.value, Value::Int(1));
        assert_eq!(cursor.rows_in_interval, 4);
        assert_eq!(cursor.rows_total, 4);
    }

    // Test Settings: RESTORE on a UUID column.
    // Scenario: Committed rows repeat one identical UUID restore value.
    // Expected Outcome: The value counts as unchanged, so no cursor is emitted.
    #[traced_test]
    #[tokio::test]
    async fn test_identical_uuid_restore_values_do_not_trigger() {
        let store = MockStore::new();
        let config = users_config(DatabaseKind::Postgres)
            .with_columns(vec![
                ColumnSpec::typed("id", "UUID"),
                ColumnSpec::typed("name", "VARCHAR"),
            ])
            .with_restore(RestoreConfig::on_column("id"));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        let id = uuid::Uuid::from_u128(42);
        let row = |name: &str| {
            RowData::from_pairs(
                "users",
                [("id", Value::Uuid(id)), ("name", Value::String(name.to_string()))],
            )
        };
        sink.write_batch(vec![row("a"), row("b"), row("c")])
            .await
            .unwrap();

        assert!(sink.snapshot().await.unwrap().is_none());
    }

    // Test Settings: RESTORE disabled.
    // Scenario: Rows are committed and a snapshot is requested.
    // Expected Outcome: No cursor is emitted and buffered rows stay buffered.
    #[traced_test]
    #[tokio::test]
    async fn test_no_cursor_when_restore_disabled() {
        let store = MockStore::new();
        let sink = build_sink(users_config(DatabaseKind::MySql), &store);
        sink.open(0, 1).await.unwrap();

        sink.write_batch(vec![user(1, "a"), user(2, "b")])
            .await
            .unwrap();
        sink.write(user(3, "c")).await.unwrap();

        assert!(sink.snapshot().await.unwrap().is_none());
        assert_eq!(committed_ids(&store), vec![Value::Int(1), Value::Int(2)]);
    }

    // Test Settings: RESTORE on column id, MAX_ROWS_PER_CHECKPOINT = 1.
    // Scenario: The flush forced by a snapshot fails.
    // Expected Outcome: CheckpointFlush is returned, is fatal, and the buffered row is rolled back.
    #[traced_test]
    #[tokio::test]
    async fn test_forced_flush_failure_fails_checkpoint() {
        let store = MockStore::new();
        let config = users_config(DatabaseKind::Postgres)
            .with_restore(RestoreConfig::on_column("id").with_max_rows(1));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        sink.write_batch(vec![user(1, "a"), user(1, "b")])
            .await
            .unwrap();
        sink.write(user(2, "c")).await.unwrap();
        store.fail_on_bind(3);

        let err = sink.snapshot().await.unwrap_err();
        assert!(matches!(err, SinkError::CheckpointFlush { .. }));
        assert!(err.is_fatal());
        assert_eq!(committed_ids(&store), vec![Value::Int(1), Value::Int(1)]);
        assert_eq!(store.rollbacks(), 1);
        assert!(logs_contain("Checkpoint flush failed"));
    }

    // Test Settings: RESTORE on a column that is not written.
    // Scenario: The sink is opened.
    // Expected Outcome: Open fails with InvalidConfiguration.
    #[traced_test]
    #[tokio::test]
    async fn test_restore_column_must_be_written() {
        let store = MockStore::new();
        let config = users_config(DatabaseKind::MySql)
            .with_restore(RestoreConfig::on_column("updated_at"));
        let sink = build_sink(config, &store);

        let err = sink.open(0, 1).await.unwrap_err();
        assert!(matches!(err, SinkError::InvalidConfiguration(_)));
        assert_eq!(store.closes(), 1);
    }

    // Test Settings: RESTORE on column id.
    // Scenario: The checkpoint authority confirms one checkpoint and aborts the next.
    // Expected Outcome: Both notifications are accepted and logged.
    #[traced_test]
    #[tokio::test]
    async fn test_checkpoint_notifications() {
        let store = MockStore::new();
        let config =
            users_config(DatabaseKind::Postgres).with_restore(RestoreConfig::on_column("id"));
        let sink = build_sink(config, &store);
        sink.open(0, 1).await.unwrap();

        sink.notify_checkpoint_complete(1).await.unwrap();
        sink.notify_checkpoint_aborted(2).await.unwrap();

        assert!(logs_contain("Checkpoint completed"));
        assert!(logs_contain("Checkpoint aborted"));
    }
}
