use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::{Status, TraceContextExt};
use std::{sync::Arc, time::Instant};
use tracing::{error, info, instrument, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;

/// Route label for requests that matched no route.
///
/// Labels come only from route templates, never from the raw URI, so the
/// number of series stays bounded whatever paths clients send.
pub const UNMATCHED_ROUTE: &str = "unmatched";

fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        Method::PATCH => "PATCH",
        _ => "OTHER",
    }
}

fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// First hop of X-Forwarded-For, else X-Real-IP
fn client_address(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// In-flight gauge entry, released on drop so a request abandoned by the
/// timeout layer does not stay counted.
struct InFlight {
    metrics: Arc<Metrics>,
    method: &'static str,
    route: String,
}

impl InFlight {
    fn enter(metrics: Arc<Metrics>, method: &'static str, route: String) -> Self {
        metrics.increment_in_flight(method, &route);
        Self {
            metrics,
            method,
            route,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.metrics.decrement_in_flight(self.method, &self.route);
    }
}

/// Server span, request metrics and one completion log line per request.
///
/// 4xx responses (vote conflicts, unknown restaurants) are ordinary outcomes
/// and logged at warn; only 5xx mark the span as failed.
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = method_label(request.method());
    let route = route_label(&request);
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let client = client_address(request.headers());

    let span = tracing::info_span!(
        target: "lunchvote_rs::http",
        "http_request",
        otel.name = %format!("{} {}", method, route),
        otel.kind = "server",
        http.request.method = method,
        http.route = %route,
        url.path = %request.uri().path(),
        user_agent.original = %user_agent,
        client.address = %client,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async move {
        let _in_flight = InFlight::enter(metrics.clone(), method, route.clone());

        let response = next.run(request).await;

        let status = response.status();
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        let span = tracing::Span::current();
        span.record("http.response.status_code", status.as_u16());
        span.record("http.response_time_ms", duration_ms);
        if status.is_server_error() {
            span.context()
                .span()
                .set_status(Status::error(format!("HTTP {}", status.as_u16())));
        } else {
            span.context().span().set_status(Status::Ok);
        }

        metrics.record_http_request(method, &route, status.as_u16(), elapsed.as_secs_f64());

        if status.is_server_error() {
            crate::error_with_trace!(
                route = %route,
                status_code = status.as_u16(),
                duration_ms = duration_ms,
                "Request failed"
            );
        } else if status.is_client_error() {
            crate::warn_with_trace!(
                route = %route,
                status_code = status.as_u16(),
                duration_ms = duration_ms,
                "Request rejected"
            );
        } else {
            crate::info_with_trace!(
                route = %route,
                status_code = status.as_u16(),
                duration_ms = duration_ms,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Middleware specifically for database operation tracing
pub struct DatabaseTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl DatabaseTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a database operation with automatic metrics recording
    #[instrument(skip_all, fields(
        operation = %operation,
        table = %table,
    ))]
    pub async fn trace_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        info!("Starting database operation");

        match future.await {
            Ok(result) => {
                let duration_seconds = start_time.elapsed().as_secs_f64();
                self.metrics
                    .record_database_operation(operation, table, true, duration_seconds);

                info!(
                    duration_ms = start_time.elapsed().as_millis(),
                    "Database operation completed successfully"
                );

                Ok(result)
            }
            Err(error) => {
                let duration_seconds = start_time.elapsed().as_secs_f64();
                self.metrics
                    .record_database_operation(operation, table, false, duration_seconds);

                error!(
                    error = %error,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Database operation failed"
                );

                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;
    use tower_http::timeout::TimeoutLayer;

    async fn total_handler() -> &'static str {
        "0"
    }

    async fn error_handler() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn slow_handler() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    fn observed(router: Router, metrics: Arc<Metrics>) -> Router {
        router.layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics.clone(), req, next)
        }))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_matched_route_uses_template_label() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed(
            Router::new().route("/api/vote/total/:restaurant_id", get(total_handler)),
            metrics.clone(),
        );

        let request = Request::builder()
            .uri("/api/vote/total/7?date=05.03.2024")
            .header("user-agent", "lunch-client/1.0")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/vote/total/:restaurant_id", "200"])
            .get();
        assert_eq!(count, 1.0);
        assert!(!metrics.encode().unwrap().contains("05.03.2024"));
    }

    #[tokio::test]
    async fn test_unmatched_paths_share_one_series() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed(
            Router::new()
                .route("/api/vote", get(total_handler))
                .fallback(|| async { StatusCode::NOT_FOUND }),
            metrics.clone(),
        );

        for i in 0..20 {
            let response = app
                .clone()
                .oneshot(get_request(&format!("/scan/{}?x={}", i, i)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", UNMATCHED_ROUTE, "404"])
            .get();
        assert_eq!(count, 20.0);

        let encoded = metrics.encode().unwrap();
        assert!(!encoded.contains("/scan/"));
        let series = encoded
            .lines()
            .filter(|line| line.starts_with("http_requests_total{"))
            .count();
        assert_eq!(series, 1);
    }

    #[tokio::test]
    async fn test_unknown_method_label_is_bounded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed(
            Router::new().fallback(|| async { StatusCode::NOT_FOUND }),
            metrics.clone(),
        );

        let request = Request::builder()
            .method("PROPFIND")
            .uri("/")
            .body(Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap();

        let count = metrics
            .http_requests_total
            .with_label_values(&["OTHER", UNMATCHED_ROUTE, "404"])
            .get();
        assert_eq!(count, 1.0);
    }

    #[tokio::test]
    async fn test_server_error_recorded() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed(
            Router::new().route("/api/vote", get(error_handler)),
            metrics.clone(),
        );

        let response = app.oneshot(get_request("/api/vote")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("status_code=\"500\""));
    }

    #[tokio::test]
    async fn test_in_flight_released_when_request_times_out() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let app = observed(
            Router::new().route("/slow", get(slow_handler)),
            metrics.clone(),
        )
        .layer(TimeoutLayer::new(Duration::from_millis(20)));

        let response = app.oneshot(get_request("/slow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let in_flight = metrics
            .http_requests_in_flight
            .with_label_values(&["GET", "/slow"])
            .get();
        assert_eq!(in_flight, 0.0);
    }

    #[test]
    fn test_client_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers), "unknown");

        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        assert_eq!(client_address(&headers), "10.0.0.9");

        headers.insert("x-forwarded-for", "203.0.113.5, 10.0.0.1".parse().unwrap());
        assert_eq!(client_address(&headers), "203.0.113.5");
    }

    #[tokio::test]
    async fn test_database_tracing_middleware() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let middleware = DatabaseTracingMiddleware::new(metrics.clone());

        // Test successful operation
        let result = middleware
            .trace_operation("GetItem", "votes", async {
                Ok::<_, String>("success")
            })
            .await;

        assert!(result.is_ok());

        // Test failed operation
        let result = middleware
            .trace_operation("PutItem", "votes", async {
                Err::<String, _>("error")
            })
            .await;

        assert!(result.is_err());

        // Verify metrics were recorded
        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("database_operations_total"));
    }
}
