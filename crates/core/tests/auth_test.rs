use broker_core::auth::{
    create_authenticator, AllowAllAuthenticator, AuthorizeResult, Authenticator, MqttQoS,
    StaticAuthenticator, SubscribeOutcome, SubscriptionRequest,
};
use broker_core::{BrokerError, Context};

fn static_config() -> Context {
    let context = Context::new();
    context.put_all([
        ("auth.type", "static"),
        ("auth.users.alice", "secret"),
        ("auth.users.bob", "hunter2"),
        ("auth.tokens.tok-123", "alice"),
        ("auth.maxQos", "1"),
        ("auth.deniedTopics", "sys/admin, internal/metrics"),
    ]);
    context
}

#[tokio::test]
async fn test_allow_all_preserves_order_and_qos() {
    let auth = AllowAllAuthenticator;
    auth.init().await.unwrap();

    let requests = vec![
        SubscriptionRequest::new("a/b", MqttQoS::ExactlyOnce),
        SubscriptionRequest::new("c/d", MqttQoS::AtMostOnce),
        SubscriptionRequest::new("e/f", MqttQoS::AtLeastOnce),
    ];
    let outcomes = auth.authorize_subscribe("c1", None, &requests).await;
    assert_eq!(
        outcomes,
        vec![
            SubscribeOutcome::Granted(MqttQoS::ExactlyOnce),
            SubscribeOutcome::Granted(MqttQoS::AtMostOnce),
            SubscribeOutcome::Granted(MqttQoS::AtLeastOnce),
        ]
    );
    assert_eq!(auth.resolve_bearer_token("anything").await, None);
    auth.destroy().await;
}

#[tokio::test]
async fn test_static_subscribe_partial_grant() {
    let auth = StaticAuthenticator::from_context(&static_config()).unwrap();
    auth.init().await.unwrap();

    let requests = vec![
        SubscriptionRequest::new("devices/1/telemetry", MqttQoS::ExactlyOnce),
        SubscriptionRequest::new("sys/admin", MqttQoS::AtMostOnce),
        SubscriptionRequest::new("devices/2/telemetry", MqttQoS::AtMostOnce),
    ];
    let outcomes = auth
        .authorize_subscribe("c1", Some("alice"), &requests)
        .await;

    assert_eq!(outcomes.len(), requests.len());
    assert_eq!(
        outcomes,
        vec![
            SubscribeOutcome::Granted(MqttQoS::AtLeastOnce),
            SubscribeOutcome::Denied,
            SubscribeOutcome::Granted(MqttQoS::AtMostOnce),
        ]
    );
}

#[tokio::test]
async fn test_static_subscribe_unknown_user_denies_every_entry() {
    let auth = StaticAuthenticator::from_context(&static_config()).unwrap();
    let requests = vec![
        SubscriptionRequest::new("a", MqttQoS::AtMostOnce),
        SubscriptionRequest::new("b", MqttQoS::AtMostOnce),
    ];
    let outcomes = auth
        .authorize_subscribe("c1", Some("mallory"), &requests)
        .await;
    assert_eq!(outcomes, vec![SubscribeOutcome::Denied; 2]);
}

#[tokio::test]
async fn test_static_connect() {
    let auth = StaticAuthenticator::from_context(&static_config()).unwrap();

    assert_eq!(
        auth.authorize_connect("c1", Some("alice"), Some("secret")).await,
        AuthorizeResult::Ok
    );
    assert_eq!(
        auth.authorize_connect("c1", Some("alice"), Some("wrong")).await,
        AuthorizeResult::Forbidden
    );
    assert_eq!(
        auth.authorize_connect("c1", Some("alice"), None).await,
        AuthorizeResult::Forbidden
    );
    assert_eq!(
        auth.authorize_connect("c1", None, None).await,
        AuthorizeResult::Forbidden
    );
}

#[tokio::test]
async fn test_static_anonymous_allowed() {
    let config = static_config();
    config.put("auth.allowAnonymous", "true");
    let auth = StaticAuthenticator::from_context(&config).unwrap();

    assert!(auth.authorize_connect("c1", None, None).await.is_granted());
    assert!(auth
        .authorize_publish("c1", None, "devices/1", MqttQoS::AtMostOnce, false)
        .await
        .is_granted());
}

#[tokio::test]
async fn test_static_publish() {
    let auth = StaticAuthenticator::from_context(&static_config()).unwrap();

    assert_eq!(
        auth.authorize_publish("c1", Some("bob"), "devices/1", MqttQoS::AtLeastOnce, true)
            .await,
        AuthorizeResult::Ok
    );
    assert_eq!(
        auth.authorize_publish("c1", Some("bob"), "devices/1", MqttQoS::ExactlyOnce, false)
            .await,
        AuthorizeResult::Forbidden
    );
    assert_eq!(
        auth.authorize_publish("c1", Some("bob"), "internal/metrics", MqttQoS::AtMostOnce, false)
            .await,
        AuthorizeResult::Forbidden
    );
}

#[tokio::test]
async fn test_static_bearer_token() {
    let auth = StaticAuthenticator::from_context(&static_config()).unwrap();

    assert_eq!(
        auth.resolve_bearer_token("tok-123").await.as_deref(),
        Some("alice")
    );
    assert_eq!(
        auth.resolve_bearer_token("Bearer tok-123").await.as_deref(),
        Some("alice")
    );
    assert_eq!(auth.resolve_bearer_token("expired").await, None);
}

#[test]
fn test_static_invalid_max_qos() {
    let config = static_config();
    config.put("auth.maxQos", "5");
    assert!(matches!(
        StaticAuthenticator::from_context(&config),
        Err(BrokerError::InvalidArgument(_))
    ));

    config.put("auth.maxQos", "high");
    assert!(matches!(
        StaticAuthenticator::from_context(&config),
        Err(BrokerError::Format { .. })
    ));
}

#[tokio::test]
async fn test_factory_selects_by_type() {
    let default_auth = create_authenticator(&Context::new()).unwrap();
    assert!(default_auth
        .authorize_connect("c1", None, None)
        .await
        .is_granted());

    let static_auth = create_authenticator(&static_config()).unwrap();
    assert!(!static_auth
        .authorize_connect("c1", None, None)
        .await
        .is_granted());

    let config = Context::new();
    config.put("auth.type", "ldap");
    match create_authenticator(&config) {
        Err(BrokerError::ConfigState { actual, .. }) => assert_eq!(actual, "ldap"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unknown type must fail"),
    }
}
