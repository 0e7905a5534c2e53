//! Handlers a routing table can refer to by name.

use http::{Request, StatusCode};
use switchyard::{path_vars, text_response, HandlerRegistry};

/// The registry of built-in handlers:
///
/// - `health`: `ok`
/// - `hello`: a greeting, personalised by a `name` variable when present
/// - `vars`: the request's path variables, one `name=value` per line
/// - `echo`: the method and request target
pub fn builtin<B: 'static>() -> HandlerRegistry<B> {
    let mut registry = HandlerRegistry::new();
    registry
        .insert_fn("health", |_req: Request<B>| text_response(StatusCode::OK, "ok\n"))
        .insert_fn("hello", |req: Request<B>| {
            let name = path_vars(&req)
                .and_then(|vars| vars.get("name"))
                .filter(|name| !name.is_empty())
                .unwrap_or("world");
            text_response(StatusCode::OK, format!("hello, {name}\n"))
        })
        .insert_fn("vars", |req: Request<B>| {
            let mut lines: Vec<String> = path_vars(&req)
                .map(|vars| vars.iter().map(|(k, v)| format!("{k}={v}\n")).collect())
                .unwrap_or_default();
            lines.sort();
            text_response(StatusCode::OK, lines.concat())
        })
        .insert_fn("echo", |req: Request<B>| {
            text_response(StatusCode::OK, format!("{} {}\n", req.method(), req.uri()))
        });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use switchyard::{MuxConfig, ServeMux};

    async fn get(mux: &ServeMux<()>, uri: &str) -> (u16, String) {
        let response = mux.serve(Request::builder().uri(uri).body(()).expect("valid request"));
        let status = response.status().as_u16();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("infallible body")
            .to_bytes();
        (status, String::from_utf8(bytes.to_vec()).expect("utf-8 body"))
    }

    fn mux() -> ServeMux<()> {
        let config = MuxConfig::default()
            .with_route("GET /health", "health")
            .with_route("GET /hello/{name}", "hello")
            .with_route("/vars/{a}/{b...}", "vars")
            .with_route("/echo/", "echo");
        ServeMux::from_config(&config, &builtin()).expect("routes register")
    }

    #[test]
    fn builtin_names() {
        let registry = builtin::<()>();
        for name in ["health", "hello", "vars", "echo"] {
            assert!(registry.contains(name), "{name}");
        }
    }

    #[tokio::test]
    async fn builtins_respond() {
        let mux = mux();
        assert_eq!(get(&mux, "/health").await, (200, "ok\n".to_string()));
        assert_eq!(get(&mux, "/hello/ana").await, (200, "hello, ana\n".to_string()));
        assert_eq!(get(&mux, "/hello/").await, (200, "hello, world\n".to_string()));
        assert_eq!(
            get(&mux, "/vars/x/y/z").await,
            (200, "a=x\nb=y/z\n".to_string())
        );
        assert_eq!(
            get(&mux, "/echo/1?q=2").await,
            (200, "GET /echo/1?q=2\n".to_string())
        );
        assert_eq!(get(&mux, "/nope").await.0, 404);
    }
}
