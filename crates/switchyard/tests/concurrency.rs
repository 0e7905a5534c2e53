//! Lookups from many threads share the tree and the value pool.

use std::thread;

use http::{Request, Response, StatusCode};

use switchyard::{configure_request, path_vars, text_response, Body, ServeMux};

const THREADS: usize = 8;
const ITERATIONS: usize = 500;

fn ok(_req: Request<()>) -> Response<Body> {
    text_response(StatusCode::OK, "ok")
}

fn lookup(mux: &ServeMux<()>, path: &str) -> (String, Option<(String, String)>) {
    let mut req = Request::builder().uri(path).body(()).expect("valid request");
    configure_request(&mut req);
    let (_, pattern) = mux.handler(&mut req);
    let vars = path_vars(&req).and_then(|vars| {
        let a = vars.get("a")?.to_string();
        let b = vars.get("b")?.to_string();
        Some((a, b))
    });
    (pattern, vars)
}

#[test]
fn concurrent_lookups_do_not_share_values() {
    let mux = ServeMux::new();
    mux.handle_fn("/x/{a}/{b}", ok).expect("register");
    mux.handle_fn("/y/{a}/{b}/{rest...}", ok).expect("register");

    thread::scope(|s| {
        for t in 0..THREADS {
            let mux = &mux;
            s.spawn(move || {
                for i in 0..ITERATIONS {
                    let (a, b) = (format!("t{t}"), format!("i{i}"));

                    let (pattern, vars) = lookup(mux, &format!("/x/{a}/{b}"));
                    assert_eq!(pattern, "/x/{a}/{b}");
                    assert_eq!(vars, Some((a.clone(), b.clone())));

                    let (pattern, vars) = lookup(mux, &format!("/y/{a}/{b}/z"));
                    assert_eq!(pattern, "/y/{a}/{b}/{rest...}");
                    assert_eq!(vars, Some((a, b)));
                }
            });
        }
    });
}

#[test]
fn registration_while_matching() {
    let mux = ServeMux::new();
    mux.handle_fn("/stable/{a}", ok).expect("register");

    thread::scope(|s| {
        let writer = &mux;
        s.spawn(move || {
            for i in 0..ITERATIONS {
                // Variable counts grow, so the pool is rebuilt between lookups.
                let vars: String = (0..=i % 6).map(|n| format!("/{{v{n}}}")).collect();
                writer
                    .handle_fn(&format!("/dynamic/{i}{vars}"), ok)
                    .expect("register");
            }
        });

        for t in 0..THREADS {
            let mux = &mux;
            s.spawn(move || {
                for i in 0..ITERATIONS {
                    let mut req = Request::builder()
                        .uri(format!("/stable/{t}-{i}"))
                        .body(())
                        .expect("valid request");
                    configure_request(&mut req);
                    let (_, pattern) = mux.handler(&mut req);
                    assert_eq!(pattern, "/stable/{a}");
                    let expected = format!("{t}-{i}");
                    assert_eq!(
                        path_vars(&req).and_then(|v| v.get("a")),
                        Some(expected.as_str())
                    );
                }
            });
        }
    });

    let (pattern, _) = lookup(&mux, "/dynamic/7/p/q");
    assert_eq!(pattern, "/dynamic/7/{v0}/{v1}");
}
