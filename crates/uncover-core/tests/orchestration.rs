//! End-to-end behaviour of the orchestration loop against scripted doubles.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use uncover_core::mock::{RecordingToolSession, ScriptStep, ScriptedGateway};
use uncover_core::{
    Message, Orchestrator, OrchestratorConfig, Role, Termination, ToolCall, ToolDescriptor,
    ToolInvocationResult,
};

fn map_tools() -> Vec<ToolDescriptor> {
    let place = json!({
        "type": "object",
        "properties": { "place": { "type": "string" } },
        "required": ["place"]
    });
    vec![
        ToolDescriptor::new("geocode_point", "Returns the center point of a place.", place.clone()),
        ToolDescriptor::new("geocode_bbox", "Returns the bounding box of a place.", place),
        ToolDescriptor::new("create_map", "Generate a map with a rectangle and markers.", json!({"type": "object"})),
    ]
}

fn orchestrator(
    session: &Arc<RecordingToolSession>,
    gateway: &Arc<ScriptedGateway>,
    max_rounds: Option<usize>,
) -> Orchestrator {
    Orchestrator::new(
        session.clone(),
        gateway.clone(),
        OrchestratorConfig { max_rounds },
    )
}

fn tool_messages(messages: &[Message]) -> Vec<(&str, &str)> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Tool(t) => Some((t.tool_call_id(), t.content())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_direct_answer_makes_no_tool_calls() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptStep::text("Minneapolis is in Minnesota.")]));

    let outcome = orchestrator(&session, &gateway, Some(10))
        .run("where is minneapolis?")
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Minneapolis is in Minnesota.");
    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.rounds, 1);
    assert!(session.calls().is_empty());

    let requests = gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tools.len(), 3);
    assert_eq!(requests[0].messages, vec![Message::user("where is minneapolis?")]);
}

#[tokio::test]
async fn test_geocode_round_trip() {
    let session = Arc::new(
        RecordingToolSession::new(map_tools())
            .with_result("geocode_point", ToolInvocationResult::success(r#"{"lat": 44.8549, "lon": -93.2422}"#)),
    );
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![ToolCall::new(
            "call_1",
            "geocode_point",
            r#"{"place": "mall of america"}"#,
        )]),
        ScriptStep::text("Done"),
    ]));

    let answer = orchestrator(&session, &gateway, None)
        .process_query("find mall of america")
        .await
        .unwrap();

    assert_eq!(answer, "Done");
    let calls = session.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "geocode_point");
    assert_eq!(serde_json::Value::Object(calls[0].arguments.clone()), json!({"place": "mall of america"}));

    let second = &gateway.requests()[1].messages;
    assert_eq!(
        tool_messages(second),
        vec![("call_1", r#"{"lat": 44.8549, "lon": -93.2422}"#)]
    );
}

#[tokio::test]
async fn test_every_call_answered_exactly_once() {
    let session = Arc::new(
        RecordingToolSession::new(map_tools()).with_transport_failure("geocode_bbox", "connection reset"),
    );
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![
            ToolCall::new("a", "geocode_point", r#"{"place": "Target Field"}"#),
            ToolCall::new("b", "geocode_bbox", r#"{"place": "Minneapolis"}"#),
            ToolCall::new("c", "create_map", "{not json"),
            ToolCall::new("d", "instagram_post_images", r#"{"caption": "hi"}"#),
        ]),
        ScriptStep::text("Partial map ready"),
    ]));

    let outcome = orchestrator(&session, &gateway, Some(10))
        .run("map minneapolis")
        .await
        .unwrap();
    assert_eq!(outcome.answer, "Partial map ready");
    assert_eq!(outcome.tool_invocations, 2);

    let requests = gateway.requests();
    let answered = tool_messages(&requests[1].messages);
    assert_eq!(answered.len(), 4);

    let ids: HashSet<&str> = answered.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, HashSet::from(["a", "b", "c", "d"]));

    let roles: Vec<Role> = requests[1].messages.iter().map(Message::role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Tool, Role::Tool, Role::Tool]
    );

    assert_eq!(answered[0].1, "geocode_point ok");
    assert!(answered[1].1.starts_with("Error calling tool geocode_bbox:"));
    assert!(answered[1].1.contains("connection reset"));
    assert!(answered[3].1.contains("instagram_post_images"));
}

#[tokio::test]
async fn test_malformed_arguments_never_reach_the_session() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![ToolCall::new("bad", "geocode_point", r#"{"place": "#)]),
        ScriptStep::text("Sorry, I could not geocode that."),
    ]));

    let outcome = orchestrator(&session, &gateway, Some(10))
        .run("find it")
        .await
        .unwrap();

    assert!(session.calls().is_empty());
    assert_eq!(outcome.tool_invocations, 0);

    let answered = tool_messages(&gateway.requests()[1].messages)
        .into_iter()
        .map(|(_, c)| c.to_string())
        .collect::<Vec<_>>();
    assert_eq!(answered.len(), 1);
    assert!(answered[0].contains("geocode_point"));
    assert!(answered[0].contains("Invalid tool arguments"));
}

#[tokio::test]
async fn test_remote_tool_error_is_fed_back() {
    let session = Arc::new(
        RecordingToolSession::new(map_tools())
            .with_result("geocode_point", ToolInvocationResult::failure("place not found")),
    );
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![ToolCall::new("x", "geocode_point", r#"{"place": "atlantis"}"#)]),
        ScriptStep::text("Atlantis could not be found."),
    ]));

    let outcome = orchestrator(&session, &gateway, Some(10))
        .run("where is atlantis")
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.answer, "Atlantis could not be found.");
    assert_eq!(outcome.rounds, 2);

    let requests = gateway.requests();
    let answered = tool_messages(&requests[1].messages);
    assert!(answered[0].1.contains("place not found"));
    assert!(answered[0].1.starts_with("Error calling tool geocode_point:"));
}

#[tokio::test]
async fn test_gateway_failure_yields_empty_answer() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![ToolCall::new("a", "geocode_point", r#"{"place": "St Paul"}"#)]),
        ScriptStep::fail("429 insufficient_quota"),
        ScriptStep::text("never seen"),
    ]));

    let outcome = orchestrator(&session, &gateway, Some(10))
        .run("map st paul")
        .await
        .unwrap();

    assert_eq!(outcome.answer, "");
    assert!(matches!(outcome.termination, Termination::GatewayFailed(ref e) if e.contains("insufficient_quota")));
    assert_eq!(session.calls().len(), 1);
    assert_eq!(gateway.remaining(), 1);
}

#[tokio::test]
async fn test_gateway_failure_on_first_round() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptStep::fail("connection refused")]));

    let answer = orchestrator(&session, &gateway, None)
        .process_query("anything")
        .await
        .unwrap();

    assert_eq!(answer, "");
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn test_round_limit_stops_without_dispatch() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let looping = || ScriptStep::tool_calls(vec![ToolCall::new("again", "geocode_point", r#"{"place": "x"}"#)]);
    let gateway = Arc::new(ScriptedGateway::new(vec![looping(), looping(), looping(), looping()]));

    let outcome = orchestrator(&session, &gateway, Some(2))
        .run("loop forever")
        .await
        .unwrap();

    assert_eq!(outcome.termination, Termination::RoundLimit);
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.answer, "");
    assert_eq!(session.calls().len(), 1);
    assert_eq!(gateway.remaining(), 2);
}

#[tokio::test]
async fn test_listing_failure_propagates() {
    let session = Arc::new(RecordingToolSession::new(map_tools()).with_listing_failure("503 from tool server"));
    let gateway = Arc::new(ScriptedGateway::new(vec![ScriptStep::text("unused")]));

    let result = orchestrator(&session, &gateway, Some(10)).run("q").await;

    assert!(matches!(result, Err(uncover_core::ClientError::Session(_))));
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn test_sequential_runs_do_not_share_state() {
    let session = Arc::new(RecordingToolSession::new(map_tools()));
    let gateway = Arc::new(ScriptedGateway::new(vec![
        ScriptStep::tool_calls(vec![ToolCall::new("a", "geocode_point", r#"{"place": "Duluth"}"#)]),
        ScriptStep::text("first answer"),
        ScriptStep::text("second answer"),
    ]));
    let orchestrator = orchestrator(&session, &gateway, Some(10));

    assert_eq!(orchestrator.process_query("first").await.unwrap(), "first answer");
    assert_eq!(orchestrator.process_query("second").await.unwrap(), "second answer");

    let requests = gateway.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].messages, vec![Message::user("second")]);
    assert_eq!(session.list_count(), 2);
}
