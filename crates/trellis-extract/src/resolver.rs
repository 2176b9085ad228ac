//! The argument resolver.
//!
//! Given the argument definitions of one endpoint and the raw input of one
//! request, the resolver produces the positional argument list or the first
//! reason the request cannot be served.
//!
//! # Checks
//!
//! For each definition, in index order:
//!
//! 1. Extract the candidate value from its source
//! 2. Query and path: fail if required and absent or `""`
//! 3. Query and path: fail if present and not in the declared format
//! 4. Body: fail if the validation engine reported any field error
//!
//! The first failure wins. Later arguments are not extracted, so no service
//! is resolved for a request that is already rejected.

use crate::error::{ResolveError, ValidationFailure};
use crate::input::RawInput;
use std::sync::Arc;
use trellis_core::{
    is_string_satisfy_format, transform_json_with_dates, Argument, ArgumentDefinition,
    ArgumentSource, Arguments, Container, Injector, RuleValidator, ValidationEngine,
};

/// Resolves handler arguments from raw request input.
///
/// The injector and the validation engine are passed in explicitly; both are
/// shared across concurrent requests.
#[derive(Clone)]
pub struct ArgumentResolver {
    injector: Arc<dyn Injector>,
    validator: Arc<dyn ValidationEngine>,
}

impl ArgumentResolver {
    /// Creates a resolver from its collaborators.
    pub fn new(injector: Arc<dyn Injector>, validator: Arc<dyn ValidationEngine>) -> Self {
        Self {
            injector,
            validator,
        }
    }

    /// Creates a resolver over a container, validating with [`RuleValidator`].
    pub fn with_container(container: Container) -> Self {
        Self::new(Arc::new(container), Arc::new(RuleValidator::new()))
    }

    /// Resolves every argument in `definitions`.
    ///
    /// `definitions` must be sorted by index and contiguous, which the endpoint
    /// registry guarantees for everything it stores.
    pub async fn resolve(
        &self,
        definitions: &[ArgumentDefinition],
        input: &RawInput,
    ) -> Result<Arguments, ResolveError> {
        let mut arguments = Arguments::new();
        for definition in definitions {
            let argument = match &definition.source {
                ArgumentSource::Query { name } => text_argument(definition, input.query(name))?,
                ArgumentSource::PathParameter { name } => {
                    text_argument(definition, input.path_param(name))?
                }
                ArgumentSource::Body { schema } => {
                    let body = transform_json_with_dates(input.body());
                    let errors = self.validator.validate(schema, &body).await;
                    if !errors.is_empty() {
                        tracing::debug!(
                            body = schema.name(),
                            errors = errors.len(),
                            "Body validation failed"
                        );
                        return Err(ValidationFailure::body_validation(&errors).into());
                    }
                    if body.is_null() {
                        Argument::Null
                    } else {
                        Argument::Body(body)
                    }
                }
                ArgumentSource::InjectedService { key } => {
                    Argument::Service(self.injector.resolve(key).await?)
                }
            };
            arguments.push(argument);
        }
        Ok(arguments)
    }
}

impl std::fmt::Debug for ArgumentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentResolver").finish_non_exhaustive()
    }
}

fn text_argument(
    definition: &ArgumentDefinition,
    value: Option<&str>,
) -> Result<Argument, ValidationFailure> {
    let value = value.filter(|v| !v.is_empty());
    let Some(value) = value else {
        if definition.required {
            return Err(ValidationFailure::required(definition.kind(), definition.name()));
        }
        return Ok(Argument::Null);
    };

    if let Some(format) = definition.format {
        if !is_string_satisfy_format(value, format) {
            return Err(ValidationFailure::invalid_format(
                definition.kind(),
                definition.name(),
                value,
                format,
            ));
        }
    }
    Ok(Argument::Text(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::di::ServiceInstance;
    use trellis_core::{
        BodySchema, FieldError, InjectionError, Rule, ServiceKey, SourceKind, StringFormat, Value,
    };

    struct Timer {
        interval_ms: u64,
    }

    struct CountingInjector {
        inner: Container,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Injector for CountingInjector {
        async fn resolve(&self, key: &ServiceKey) -> Result<ServiceInstance, InjectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Injector::resolve(&self.inner, key).await
        }
    }

    fn container() -> Container {
        let mut container = Container::new();
        container.register_value(Timer { interval_ms: 1000 });
        container
    }

    fn profile_args() -> Vec<ArgumentDefinition> {
        vec![
            ArgumentDefinition::service(0, ServiceKey::of::<Timer>()),
            ArgumentDefinition::path(1, "age"),
            ArgumentDefinition::query(2, "userId")
                .optional()
                .with_format(StringFormat::Date),
        ]
    }

    fn body_args() -> Vec<ArgumentDefinition> {
        vec![ArgumentDefinition::body(
            0,
            BodySchema::new("BodyRequest")
                .field("age", [Rule::IsString])
                .field("bord", [Rule::IsDate]),
        )]
    }

    fn failure(err: ResolveError) -> ValidationFailure {
        match err {
            ResolveError::Validation(f) => f,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolves_in_declared_order() {
        let resolver = ArgumentResolver::with_container(container());
        let input = RawInput::new()
            .with_path_param("age", "30")
            .with_query("userId", "2020-01-01");

        let args = resolver.resolve(&profile_args(), &input).await.unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args.service::<Timer>(0).unwrap().interval_ms, 1000);
        assert_eq!(args.text(1).unwrap(), "30");
        assert_eq!(args.text(2).unwrap(), "2020-01-01");
    }

    #[tokio::test]
    async fn test_optional_absent_is_null() {
        let resolver = ArgumentResolver::with_container(container());
        let input = RawInput::new().with_path_param("age", "30");

        let args = resolver.resolve(&profile_args(), &input).await.unwrap();
        assert!(args.get(2).unwrap().is_null());
        assert_eq!(args.optional_text(2).unwrap(), None);
    }

    #[tokio::test]
    async fn test_optional_empty_string_skips_format() {
        let resolver = ArgumentResolver::with_container(container());
        let input = RawInput::new()
            .with_path_param("age", "30")
            .with_query("userId", "");

        let args = resolver.resolve(&profile_args(), &input).await.unwrap();
        assert!(args.get(2).unwrap().is_null());
    }

    #[tokio::test]
    async fn test_required_query_missing() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let defs = vec![ArgumentDefinition::query(0, "userId")];

        let err = resolver.resolve(&defs, &RawInput::new()).await.unwrap_err();
        let failure = failure(err);
        assert_eq!(failure.cause, "Required query \"userId\" not found");
        assert_eq!(failure.details, None);
    }

    #[tokio::test]
    async fn test_required_query_empty_string() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let defs = vec![ArgumentDefinition::query(0, "userId")];
        let input = RawInput::new().with_query("userId", "");

        let failure = failure(resolver.resolve(&defs, &input).await.unwrap_err());
        assert!(failure.cause.contains("query"));
        assert!(failure.cause.contains("userId"));
    }

    #[tokio::test]
    async fn test_required_path_missing() {
        let resolver = ArgumentResolver::with_container(container());
        let failure = failure(
            resolver
                .resolve(&profile_args(), &RawInput::new())
                .await
                .unwrap_err(),
        );
        assert_eq!(failure.cause, "Required parameter \"age\" not found");
    }

    #[tokio::test]
    async fn test_format_mismatch() {
        let resolver = ArgumentResolver::with_container(container());
        let input = RawInput::new()
            .with_path_param("age", "30")
            .with_query("userId", "42");

        let failure = failure(resolver.resolve(&profile_args(), &input).await.unwrap_err());
        assert_eq!(failure.cause, "Invalid format of query \"userId\".");
        assert_eq!(failure.details, Some(json!("\"42\" received, Date required.")));
    }

    #[tokio::test]
    async fn test_format_on_path_parameter() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let defs = vec![ArgumentDefinition::path(0, "day").with_format(StringFormat::Date)];

        let ok = RawInput::new().with_path_param("day", "2024-02-29");
        assert!(resolver.resolve(&defs, &ok).await.is_ok());

        let bad = RawInput::new().with_path_param("day", "2023-02-29");
        let failure = failure(resolver.resolve(&defs, &bad).await.unwrap_err());
        assert_eq!(failure.cause, "Invalid format of parameter \"day\".");
    }

    #[tokio::test]
    async fn test_valid_body_has_dates() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let input = RawInput::new().with_body(json!({"age": "x", "bord": "1990-05-17"}));

        let args = resolver.resolve(&body_args(), &input).await.unwrap();
        let body = args.body_value(0).unwrap();
        assert!(body.get("bord").and_then(Value::as_date).is_some());
        assert_eq!(body.get("age"), Some(&Value::from("x")));
    }

    #[tokio::test]
    async fn test_body_validation_failure() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let input = RawInput::new().with_body(json!({"age": "x", "bord": "not-a-date"}));

        let failure = failure(resolver.resolve(&body_args(), &input).await.unwrap_err());
        assert_eq!(failure.cause, "Body validation failed");
        let details = failure.details.unwrap();
        assert_eq!(details[0]["property"], "bord");
        assert!(details[0]["constraints"]["isDate"].is_string());
    }

    #[tokio::test]
    async fn test_missing_body_fails_validation() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let failure = failure(
            resolver
                .resolve(&body_args(), &RawInput::new())
                .await
                .unwrap_err(),
        );
        assert_eq!(failure.cause, "Body validation failed");
    }

    #[tokio::test]
    async fn test_raw_body_not_mutated() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let input = RawInput::new().with_body(json!({"age": "x", "bord": "1990-05-17"}));
        resolver.resolve(&body_args(), &input).await.unwrap();
        assert_eq!(input.body(), &json!({"age": "x", "bord": "1990-05-17"}));
    }

    #[tokio::test]
    async fn test_first_failure_short_circuits() {
        let injector = Arc::new(CountingInjector {
            inner: container(),
            calls: AtomicUsize::new(0),
        });
        let resolver = ArgumentResolver::new(injector.clone(), Arc::new(RuleValidator::new()));
        let defs = vec![
            ArgumentDefinition::query(0, "a").with_format(StringFormat::Date),
            ArgumentDefinition::query(1, "b"),
            ArgumentDefinition::service(2, ServiceKey::of::<Timer>()),
        ];
        let input = RawInput::new().with_query("a", "nope");

        let failure = failure(resolver.resolve(&defs, &input).await.unwrap_err());
        assert!(failure.cause.starts_with("Invalid format"));
        assert_eq!(injector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_service_is_not_a_validation_failure() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let defs = vec![ArgumentDefinition::service(0, ServiceKey::of::<Timer>())];

        let err = resolver.resolve(&defs, &RawInput::new()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Injection(_)));
    }

    #[tokio::test]
    async fn test_custom_validation_engine() {
        struct RejectAll;

        #[async_trait]
        impl ValidationEngine for RejectAll {
            async fn validate(&self, _schema: &BodySchema, _instance: &Value) -> Vec<FieldError> {
                vec![FieldError::new("*", None).with_constraint("custom", "rejected")]
            }
        }

        let resolver = ArgumentResolver::new(Arc::new(Container::new()), Arc::new(RejectAll));
        let input = RawInput::new().with_body(json!({"age": "x", "bord": "2020-01-01"}));
        let failure = failure(resolver.resolve(&body_args(), &input).await.unwrap_err());
        assert_eq!(failure.details.unwrap()[0]["constraints"]["custom"], "rejected");
    }

    #[tokio::test]
    async fn test_no_arguments() {
        let resolver = ArgumentResolver::with_container(Container::new());
        let args = resolver.resolve(&[], &RawInput::new()).await.unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_source_kind_in_messages() {
        let def = ArgumentDefinition::path(0, "age");
        let failure = text_argument(&def, None).unwrap_err();
        assert!(failure.cause.contains(SourceKind::PathParameter.as_str()));
    }
}
