//! Command-sequencing core for a remote automation client.
//!
//! A [`Session`] turns independently issued commands into one ordered chain
//! of [`Link`]s. Each link waits for the one before it, receives its
//! outcome (so a resolved element flows into the next command as its
//! target), and routes failures through recovery handlers before they reach
//! calling code.

pub mod command;
pub mod commands;
pub mod config;
pub mod context;
pub mod link;
pub mod loader;
pub mod log;
pub mod metrics;
mod pipeline;
pub mod recovery;
pub mod session;
pub mod surface;
pub mod table;
pub mod trace;
pub mod unify;
pub mod wait;

pub use command::{command_fn, Command, CommandPath, FnCommand, Signature};
pub use config::{CaptureOnFailure, ChainConfig, SessionConfig, TransportSettings, WaitConfig};
pub use context::CommandContext;
pub use link::{Continuation, Link, LinkSnapshot, LinkState, Settlement};
pub use loader::{load_config, load_config_with_options, ConfigError, LoadOptions};
pub use log::{CommandLog, CommandLogEntry};
pub use metrics::{process_totals, ChainCounter, ChainMetrics, MetricsSnapshot};
pub use recovery::{RecoveryChain, RecoveryHandler};
pub use session::{Session, SessionBuilder};
pub use surface::{ChainSurface, CommandRequest, RequestBody, Target};
pub use table::CommandTable;
pub use unify::{unify, unify_outcome, unify_values, UnifyOptions};
pub use wait::WaitLoop;

pub use wdchain_core_types::{ChainError, ChainErrorKind, ChainResult, Outcome, TargetRef};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use wdchain_core_types::{SessionId, ELEMENT_KEY};
    use wdchain_event_bus::ChainEvent;
    use wdchain_transport::{Method, ScriptedTransport, TransportError};

    use super::*;

    fn scripted() -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new(SessionId("s-1".into()));
        transport
            .on(Method::Post, "/session/:sessionId/element", |body| {
                match body["value"].as_str() {
                    Some("#missing") => Err(TransportError::NoSuchElement("#missing".into())),
                    _ => Ok(json!({ ELEMENT_KEY: "el-1" })),
                }
            })
            .respond(Method::Post, "/session/:sessionId/element/el-1/click", Value::Null)
            .respond(Method::Get, "/session/:sessionId/element/el-1/text", json!("Sign in"))
            .respond(Method::Get, "/session/:sessionId/title", json!("Example"));
        transport
    }

    fn session(transport: &Arc<ScriptedTransport>) -> Session {
        Session::builder()
            .with_session_id(SessionId("s-1".into()))
            .with_transport(Arc::clone(transport))
            .build()
    }

    #[tokio::test]
    async fn element_flows_into_following_commands() {
        let transport = scripted();
        let session = session(&transport);

        let text = session
            .element("#login")
            .click(Target::Implicit)
            .get_text(Target::Implicit)
            .await
            .unwrap();

        assert_eq!(text.as_str(), Some("Sign in"));
        let names: Vec<_> = session.command_log().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["element", "click", "getText"]);
    }

    #[tokio::test]
    async fn selector_targets_resolve_through_nested_element() {
        let transport = scripted();
        let session = session(&transport);

        let link = session.click("#login");
        link.clone().await.unwrap();

        assert_eq!(transport.calls_to(Method::Post, "/session/:sessionId/element").len(), 1);
        assert_eq!(link.depth(), 0);
        let log = session.command_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].name, "element");
    }

    #[tokio::test]
    async fn not_found_short_circuits_targeted_commands() {
        let transport = scripted();
        let session = session(&transport);

        let err = session
            .element("#missing")
            .click(Target::Implicit)
            .await
            .unwrap_err();

        assert!(err.is_no_such_element());
        assert!(err.to_string().contains("#missing"));
        assert!(transport
            .calls()
            .iter()
            .all(|call| !call.path.ends_with("/click")));
    }

    #[tokio::test]
    async fn session_chain_keeps_running_after_a_failure() {
        let transport = scripted();
        let session = session(&transport);

        let failed = session.element("#missing").click(Target::Implicit);
        let title = session.get_title();

        assert!(failed.await.unwrap_err().is_finalized());
        assert_eq!(title.await.unwrap().as_str(), Some("Example"));
        assert_eq!(transport.calls_to(Method::Get, "/session/:sessionId/title").len(), 1);
    }

    #[tokio::test]
    async fn implicit_target_after_a_missing_element_still_fails_fast() {
        let transport = scripted();
        let session = session(&transport);

        let _failed = session.element("#missing").click(Target::Implicit);
        let err = session.click(Target::Implicit).await.unwrap_err();

        assert!(err.is_no_such_element());
        assert_eq!(err.selector(), Some("#missing"));
        assert!(transport
            .calls()
            .iter()
            .all(|call| !call.path.ends_with("/click")));
        assert_eq!(session.metrics().short_circuited, 2);
    }

    #[tokio::test]
    async fn catch_restores_the_chain() {
        let transport = scripted();
        let session = session(&transport);

        let title = session
            .element("#missing")
            .click(Target::Implicit)
            .catch(|_| async { Ok(Outcome::unit()) })
            .get_title()
            .await
            .unwrap();
        assert_eq!(title.as_str(), Some("Example"));
    }

    #[tokio::test]
    async fn events_fire_per_dispatch_and_failure() {
        let transport = scripted();
        let session = session(&transport);
        let mut events = session.subscribe();

        let _ = session.element("#missing").click(Target::Implicit).await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["command", "result", "command", "error"]);
    }

    #[tokio::test]
    async fn wait_for_exist_times_out_with_one_group() {
        let transport = scripted();
        transport.respond(Method::Post, "/session/:sessionId/elements", json!([]));
        let session = Session::builder()
            .with_transport(Arc::clone(&transport))
            .with_config(ChainConfig {
                wait: WaitConfig {
                    timeout_ms: 40,
                    interval_ms: 5,
                },
                ..ChainConfig::default()
            })
            .build();
        let mut events = session.subscribe();

        let err = session
            .wait_for_exist("#late", None)
            .await
            .unwrap_err();

        assert!(err.is_wait_timeout());
        assert_eq!(err.trace().groups().count(), 1);
        assert!(err.diagnostic().contains("polling iterations"));
        let mut errors = 0;
        while let Ok(event) = events.try_recv() {
            if let ChainEvent::Error { .. } = event {
                errors += 1;
            }
        }
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn pause_and_call_run_in_order() {
        let session = Session::builder().build();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        session.pause(20).call(move |_ctx| async move {
            first.lock().push("call");
            Ok(Outcome::unit())
        });
        let last = session.call(move |_ctx| async move {
            second.lock().push("after");
            Ok(Outcome::from("done"))
        });

        let done = tokio::time::timeout(Duration::from_secs(2), last).await.unwrap();
        assert_eq!(done.unwrap().as_str(), Some("done"));
        assert_eq!(*order.lock(), vec!["call", "after"]);
    }
}
