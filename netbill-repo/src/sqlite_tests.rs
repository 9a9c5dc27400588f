//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use netbill_types::{
        AttemptStatus, Currency, Money, Payment, PaymentId, PaymentRepository, PaymentStatus,
        RepoError, TransitionOutcome, TransitionStamps, WebhookAttempt, WebhookAttemptId,
        WebhookEndpointId, WebhookStore,
    };

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn pending_payment(order_id: &str) -> Payment {
        Payment::new(
            order_id,
            Money::new(1500, Currency::TZS).unwrap(),
            "swiftpay",
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_get_payment() {
        let repo = setup_repo().await;

        let payment = pending_payment("ORD-1");
        repo.create_payment(&payment).await.unwrap();

        let fetched = repo.get_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, payment.id);
        assert_eq!(fetched.order_id, "ORD-1");
        assert_eq!(fetched.status, PaymentStatus::Pending);
        assert_eq!(fetched.amount.amount(), 1500);
        assert_eq!(fetched.amount.currency(), Currency::TZS);
        assert!(fetched.transaction_ref.is_none());
    }

    #[tokio::test]
    async fn test_get_payment_not_found() {
        let repo = setup_repo().await;

        let result = repo.get_payment(PaymentId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mark_initiated_stores_reference() {
        let repo = setup_repo().await;
        let payment = pending_payment("ORD-1");
        repo.create_payment(&payment).await.unwrap();

        let raw = serde_json::json!({"reference": "SP000001"});
        let initiated = repo
            .mark_initiated(
                payment.id,
                "SP000001",
                Some("https://pay.test/SP000001"),
                &raw,
            )
            .await
            .unwrap();

        assert_eq!(initiated.status, PaymentStatus::Initiated);
        assert_eq!(initiated.transaction_ref.as_deref(), Some("SP000001"));
        assert_eq!(
            initiated.redirect_url.as_deref(),
            Some("https://pay.test/SP000001")
        );
        assert!(initiated.raw_response.is_some());

        let found = repo.find_by_reference("SP000001").await.unwrap().unwrap();
        assert_eq!(found.id, payment.id);
    }

    #[tokio::test]
    async fn test_duplicate_reference_is_conflict() {
        let repo = setup_repo().await;
        let first = pending_payment("ORD-1");
        let second = pending_payment("ORD-2");
        repo.create_payment(&first).await.unwrap();
        repo.create_payment(&second).await.unwrap();

        let raw = serde_json::json!({});
        repo.mark_initiated(first.id, "SP000001", None, &raw)
            .await
            .unwrap();

        let result = repo.mark_initiated(second.id, "SP000001", None, &raw).await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_transition_compare_and_set() {
        let repo = setup_repo().await;
        let payment = pending_payment("ORD-1");
        repo.create_payment(&payment).await.unwrap();
        repo.mark_initiated(payment.id, "SP000001", None, &serde_json::json!({}))
            .await
            .unwrap();

        let now = Utc::now();
        let stamps = TransitionStamps {
            paid_at: Some(now),
            confirmed_at: Some(now),
            ..Default::default()
        };

        // First CAS wins
        let outcome = repo
            .transition(
                payment.id,
                PaymentStatus::Initiated,
                PaymentStatus::Success,
                stamps.clone(),
            )
            .await
            .unwrap();
        let applied = match outcome {
            TransitionOutcome::Applied(p) => p,
            TransitionOutcome::Superseded(_) => panic!("first transition should apply"),
        };
        assert_eq!(applied.status, PaymentStatus::Success);
        assert!(applied.paid_at.is_some());
        assert!(applied.confirmed_at.is_some());

        // Second identical CAS loses and reports the converged row
        let outcome = repo
            .transition(
                payment.id,
                PaymentStatus::Initiated,
                PaymentStatus::Success,
                stamps,
            )
            .await
            .unwrap();
        match outcome {
            TransitionOutcome::Superseded(p) => assert_eq!(p.status, PaymentStatus::Success),
            TransitionOutcome::Applied(_) => panic!("duplicate transition must not apply"),
        }
    }

    #[tokio::test]
    async fn test_transition_unknown_payment() {
        let repo = setup_repo().await;

        let result = repo
            .transition(
                PaymentId::new(),
                PaymentStatus::Initiated,
                PaymentStatus::Success,
                TransitionStamps::default(),
            )
            .await;
        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_record_verification() {
        let repo = setup_repo().await;
        let payment = pending_payment("ORD-1");
        repo.create_payment(&payment).await.unwrap();

        let now = Utc::now();
        repo.record_verification(payment.id, now).await.unwrap();

        let fetched = repo.get_payment(payment.id).await.unwrap().unwrap();
        assert!(fetched.verified_at.is_some());
        // Status untouched by a reconciliation pass
        assert_eq!(fetched.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_payments_for_order() {
        let repo = setup_repo().await;
        repo.create_payment(&pending_payment("ORD-1")).await.unwrap();
        repo.create_payment(&pending_payment("ORD-1")).await.unwrap();
        repo.create_payment(&pending_payment("ORD-2")).await.unwrap();

        let payments = repo.list_payments_for_order("ORD-1").await.unwrap();
        assert_eq!(payments.len(), 2);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Webhook endpoints & attempts
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_and_get_endpoint() {
        let repo = setup_repo().await;

        let endpoint = repo
            .register_endpoint(
                "https://example.com/hook",
                vec!["payment.succeeded".into()],
                "whsec_abc",
            )
            .await
            .unwrap();

        assert!(endpoint.is_active);
        assert_eq!(endpoint.failure_count, 0);

        let fetched = repo.get_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(fetched.url, "https://example.com/hook");
        assert_eq!(fetched.secret, "whsec_abc");
        assert_eq!(fetched.events, vec!["payment.succeeded".to_string()]);
    }

    #[tokio::test]
    async fn test_active_endpoints_filter_by_event() {
        let repo = setup_repo().await;

        repo.register_endpoint("https://a.test/h", vec!["payment.succeeded".into()], "s1")
            .await
            .unwrap();
        repo.register_endpoint("https://b.test/h", vec!["order.completed".into()], "s2")
            .await
            .unwrap();
        // Empty subscription set means all events
        repo.register_endpoint("https://c.test/h", vec![], "s3")
            .await
            .unwrap();

        let matching = repo.active_endpoints_for("payment.succeeded").await.unwrap();
        let urls: Vec<&str> = matching.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(matching.len(), 2);
        assert!(urls.contains(&"https://a.test/h"));
        assert!(urls.contains(&"https://c.test/h"));
    }

    #[tokio::test]
    async fn test_inactive_endpoint_excluded() {
        let repo = setup_repo().await;

        let endpoint = repo
            .register_endpoint("https://a.test/h", vec![], "s1")
            .await
            .unwrap();

        // Drive it past the ceiling
        for _ in 0..3 {
            repo.record_endpoint_failure(endpoint.id, 3).await.unwrap();
        }

        let matching = repo.active_endpoints_for("payment.succeeded").await.unwrap();
        assert!(matching.is_empty());

        let fetched = repo.get_endpoint(endpoint.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert_eq!(fetched.failure_count, 3);
    }

    #[tokio::test]
    async fn test_failure_count_resets_on_success() {
        let repo = setup_repo().await;

        let endpoint = repo
            .register_endpoint("https://a.test/h", vec![], "s1")
            .await
            .unwrap();

        let count = repo.record_endpoint_failure(endpoint.id, 10).await.unwrap();
        assert_eq!(count, 1);
        let count = repo.record_endpoint_failure(endpoint.id, 10).await.unwrap();
        assert_eq!(count, 2);

        repo.record_endpoint_success(endpoint.id).await.unwrap();

        let fetched = repo.get_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(fetched.failure_count, 0);
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_attempt_lifecycle_and_history() {
        let repo = setup_repo().await;

        let endpoint = repo
            .register_endpoint("https://a.test/h", vec![], "s1")
            .await
            .unwrap();

        let first = WebhookAttempt::new(endpoint.id, "payment.succeeded", r#"{"n":1}"#, 1);
        repo.create_attempt(&first).await.unwrap();
        repo.complete_attempt(first.id, AttemptStatus::Failed, Some(500), Some("HTTP 500".into()))
            .await
            .unwrap();

        let retry = WebhookAttempt::new(endpoint.id, "payment.succeeded", r#"{"n":1}"#, 2);
        repo.create_attempt(&retry).await.unwrap();
        repo.complete_attempt(retry.id, AttemptStatus::Success, Some(200), None)
            .await
            .unwrap();

        let history = repo.list_attempts_for_endpoint(endpoint.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].attempt_number, 1);
        assert_eq!(history[0].status, AttemptStatus::Failed);
        assert_eq!(history[0].response_code, Some(500));
        assert!(history[0].responded_at.is_some());
        assert_eq!(history[1].attempt_number, 2);
        assert_eq!(history[1].status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_complete_unknown_attempt() {
        let repo = setup_repo().await;

        let result = repo
            .complete_attempt(WebhookAttemptId::new(), AttemptStatus::Success, Some(200), None)
            .await;
        assert!(matches!(result, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn test_record_failure_unknown_endpoint() {
        let repo = setup_repo().await;

        let result = repo
            .record_endpoint_failure(WebhookEndpointId::new(), 3)
            .await;
        assert!(matches!(result, Err(RepoError::NotFound)));
    }
}
