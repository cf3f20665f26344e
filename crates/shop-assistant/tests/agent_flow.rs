//! End-to-end runs of the shopping agent against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use agent_core::mock::ScriptedProvider;
use agent_core::{AgentConfig, Completion, LlmProvider, Message, RunContext, ToolCall, Transcript};
use shop_assistant::{MockShopBackend, shop_agent};

fn setup(
    script: Vec<Completion>,
) -> (Arc<ScriptedProvider>, Arc<MockShopBackend>, agent_core::Agent) {
    let provider = Arc::new(ScriptedProvider::replies(script));
    let backend = Arc::new(MockShopBackend::new());
    let agent = shop_agent(
        provider.clone() as Arc<dyn LlmProvider>,
        backend.clone(),
        AgentConfig::default(),
    );
    (provider, backend, agent)
}

fn tool_payloads(messages: &[Message]) -> Vec<(String, serde_json::Value)> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Tool { tool_call_id, content, .. } => Some((
                tool_call_id.clone(),
                serde_json::from_str(content).unwrap(),
            )),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn find_and_add_never_calls_the_model() {
    let (provider, backend, agent) = setup(vec![]);

    let reply = agent
        .invoke("Find charger and add it to cart", &RunContext::with_token("tok"))
        .await;

    assert_eq!(reply, "✅ **USB-C Charger 65W** has been successfully added to your cart.");
    assert_eq!(provider.calls(), 0);
    assert_eq!(backend.cart_qty("p-charger-65").await, 1);
}

#[tokio::test]
async fn planner_searches_then_adds_then_answers() {
    let (provider, backend, agent) = setup(vec![
        Completion::tools(vec![
            ToolCall::new("call_1", "searchProduct").with_arg("query", "mouse"),
        ]),
        Completion::tools(vec![
            ToolCall::new("call_2", "addProductToCart").with_arg("productId", "p-mouse"),
        ]),
        Completion::text("I added the **Wireless Mouse** to your cart."),
    ]);

    let mut transcript = Transcript::from_user("I need a mouse for my laptop, put one in my cart");
    let report = agent
        .run(&mut transcript, &RunContext::with_token("tok"))
        .await
        .unwrap();

    assert_eq!(report.reply, "I added the **Wireless Mouse** to your cart.");
    assert_eq!(report.planner_turns, 3);
    assert_eq!(report.tool_batches, 2);
    assert!(!report.fast_path);
    assert_eq!(provider.calls(), 3);
    assert_eq!(backend.cart_qty("p-mouse").await, 1);

    let payloads = tool_payloads(transcript.messages());
    assert_eq!(payloads[0].1[0]["_id"], "p-mouse");
    assert_eq!(payloads[1].1["success"], true);
}

#[tokio::test]
async fn search_outage_does_not_abort_sibling_calls() {
    let (provider, backend, agent) = setup(vec![
        Completion::tools(vec![
            ToolCall::new("call_search", "searchProduct").with_arg("query", "mouse"),
            ToolCall::new("call_add", "addProductToCart").with_arg("input", "p-mouse"),
        ]),
        Completion::text("The catalog is down, but the mouse is in your cart."),
    ]);
    backend.set_search_down(true);

    let reply = agent.invoke("add the mouse p-mouse", &RunContext::with_token("tok")).await;

    assert_eq!(reply, "The catalog is down, but the mouse is in your cart.");
    let requests = provider.requests();
    let payloads = tool_payloads(&requests[1]);
    assert_eq!(payloads[0].0, "call_search");
    assert_eq!(payloads[0].1["success"], false);
    assert!(!payloads[0].1["error"].is_null());
    assert_eq!(payloads[1].0, "call_add");
    assert_eq!(payloads[1].1["success"], true);
}

#[tokio::test]
async fn results_follow_request_order_not_completion_order() {
    let provider = Arc::new(ScriptedProvider::replies(vec![
        Completion::tools(vec![
            ToolCall::new("slow", "searchProduct").with_arg("query", "charger"),
            ToolCall::new("fast", "searchProduct").with_arg("query", "mouse"),
        ]),
        Completion::text("Here you go."),
    ]));
    let backend = Arc::new(
        MockShopBackend::new().with_search_delay("charger", Duration::from_millis(50)),
    );
    let agent = shop_agent(provider.clone() as Arc<dyn LlmProvider>, backend, AgentConfig::default());

    agent.invoke("show me chargers and mice", &RunContext::with_token("tok")).await;

    let ids: Vec<_> = tool_payloads(&provider.requests()[1])
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec!["slow", "fast"]);
}

#[tokio::test]
async fn model_cannot_override_the_caller_token() {
    let (_, backend, agent) = setup(vec![
        Completion::tools(vec![
            ToolCall::new("call_1", "addProductToCart")
                .with_arg("productId", "p-mouse")
                .with_arg("token", "forged"),
        ]),
        Completion::text("Done."),
    ]);

    agent.invoke("put p-mouse in my cart", &RunContext::with_token("real")).await;

    let adds = backend.cart_adds().await;
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].token.as_deref(), Some("real"));
}

#[tokio::test]
async fn unknown_tool_fails_the_batch_before_side_effects() {
    let (provider, backend, agent) = setup(vec![Completion::tools(vec![
        ToolCall::new("call_1", "addProductToCart").with_arg("productId", "p-mouse"),
        ToolCall::new("call_2", "checkout"),
    ])]);

    let mut transcript = Transcript::new();
    let reply = agent
        .reply(&mut transcript, "buy the mouse", &RunContext::with_token("tok"))
        .await;

    assert_eq!(reply, "Sorry, I couldn't complete that action on the store. Please try again.");
    assert_eq!(provider.calls(), 1);
    assert!(backend.cart_adds().await.is_empty());
    assert_eq!(transcript.len(), 2);
}

#[tokio::test]
async fn plain_question_is_answered_by_the_model() {
    let (provider, _, agent) = setup(vec![Completion::text("We stock chargers from 20W to 65W.")]);

    let reply = agent
        .invoke("what chargers do you have", &RunContext::with_token("tok"))
        .await;

    assert_eq!(reply, "We stock chargers from 20W to 65W.");
    assert_eq!(provider.calls(), 1);
}
