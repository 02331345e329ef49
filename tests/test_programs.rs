//! Small end-to-end programs built from replicating servers and choices

use anyhow::anyhow;
use parking_lot::Mutex;
use pipl::{
    BufferingEventSink, ChannelId, Engine, EngineConfig, EngineEvent, LoggingEventSink, Name,
    ProcessId, Value,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// `!in(x).out<x>`
fn forwarder(engine: &mut Engine, input: ChannelId, output: ChannelId) -> pipl::Result<ProcessId> {
    let p = engine.make_replicating_sequence();
    let x = engine.add_read(p, input)?;
    engine.add_send(p, output, x)?;
    Ok(p)
}

/// `!in(n).f(n).reply<n>`
fn arithmetic_server<F>(
    engine: &mut Engine,
    input: ChannelId,
    reply: ChannelId,
    label: &str,
    op: F,
) -> pipl::Result<ProcessId>
where
    F: Fn(i64) -> i64 + Send + Sync + 'static,
{
    let p = engine.make_replicating_sequence();
    let n = engine.add_read(p, input)?;
    engine.add_function(p, label, &[n.clone()], move |args| {
        let value = args[0]
            .as_int()
            .ok_or_else(|| anyhow!("expected an integer, got {}", args[0]))?;
        args[0] = Value::Int(op(value));
        Ok(())
    })?;
    engine.add_send(p, reply, n)?;
    Ok(p)
}

#[test]
fn test_character_relay_preserves_order() -> pipl::Result<()> {
    init_tracing();
    let mut engine = Engine::new();
    let hops: Vec<ChannelId> = (0..4).map(|_| engine.make_channel()).collect();
    let received = Arc::new(Mutex::new(String::new()));

    let program = engine.make_parallel_process();
    for pair in hops.windows(2) {
        let f = forwarder(&mut engine, pair[0], pair[1])?;
        engine.add_process(program, f)?;
    }

    let sink = engine.make_replicating_sequence();
    let c = engine.add_read(sink, hops[3])?;
    let out = received.clone();
    engine.add_function(sink, "print", &[c], move |args| {
        let ch = args[0]
            .as_char()
            .ok_or_else(|| anyhow!("expected a character, got {}", args[0]))?;
        out.lock().push(ch);
        Ok(())
    })?;
    engine.add_process(program, sink)?;

    let source = engine.make_sequence();
    for ch in "hello".chars() {
        engine.add_send(source, hops[0], ch)?;
    }
    engine.add_process(program, source)?;

    let stats = engine.run(program)?;
    assert_eq!(received.lock().as_str(), "hello");
    // Every character crosses every hop
    assert_eq!(stats.synchronizations, 5 * 4);
    assert!(engine.is_inert(source)?);
    for hop in &hops {
        let (senders, _) = engine.pending_offers(*hop)?;
        assert_eq!(senders, 0);
    }
    Ok(())
}

#[test]
fn test_arithmetic_servers_compose() -> pipl::Result<()> {
    init_tracing();
    let mut engine = Engine::new();
    engine.set_event_sink(Arc::new(LoggingEventSink));
    let inc = engine.make_channel();
    let dbl = engine.make_channel();
    let reply = engine.make_channel();

    let servers = engine.make_parallel_process();
    let s1 = arithmetic_server(&mut engine, inc, reply, "increment", |n| n + 1)?;
    let s2 = arithmetic_server(&mut engine, dbl, reply, "double", |n| n * 2)?;
    engine.add_process(servers, s1)?;
    engine.add_process(servers, s2)?;
    engine.run(servers)?;

    // inc<5>.reply(a).dbl<a>.reply(b)
    let client = engine.make_sequence();
    engine.add_send(client, inc, 5)?;
    let a = engine.add_read(client, reply)?;
    engine.add_send(client, dbl, a.clone())?;
    let b = engine.add_read(client, reply)?;

    let stats = engine.run(client)?;
    assert_eq!(stats.synchronizations, 4);
    assert_eq!(stats.replicas_forked, 2);
    assert_eq!(engine.binding(client, a)?, Value::Int(6));
    assert_eq!(engine.binding(client, b)?, Value::Int(12));
    assert!(engine.is_inert(client)?);
    Ok(())
}

#[test]
fn test_client_choice_picks_available_server() -> pipl::Result<()> {
    let mut engine = Engine::with_config(EngineConfig::development())?;
    let events = Arc::new(BufferingEventSink::new());
    engine.set_event_sink(events.clone());

    let inc = engine.make_channel();
    let dbl = engine.make_channel();
    let reply = engine.make_channel();

    // Only the doubling service is running
    let server = arithmetic_server(&mut engine, dbl, reply, "double", |n| n * 2)?;
    engine.run(server)?;

    let client = engine.make_choice_process();
    let mut arms = Vec::new();
    let mut results: Vec<Name> = Vec::new();
    for service in [inc, dbl] {
        let arm = engine.make_sequence();
        engine.add_send(arm, service, 21)?;
        results.push(engine.add_read(arm, reply)?);
        engine.add_process(client, arm)?;
        arms.push(arm);
    }

    let stats = engine.run(client)?;
    assert_eq!(stats.cancellations, 1);
    assert_eq!(engine.binding(arms[1], results[1].clone())?, Value::Int(42));
    assert_eq!(engine.binding(arms[0], results[0].clone())?, results[0].initial_value());
    assert_eq!(engine.pending_offers(inc)?, (0, 0));
    assert!(engine.is_inert(client)?);

    let cancelled: Vec<_> = events
        .events()
        .into_iter()
        .filter(|event| matches!(event, EngineEvent::Cancelled { .. }))
        .collect();
    assert_eq!(
        cancelled,
        vec![EngineEvent::Cancelled {
            channel: inc,
            process: arms[0],
            choice: client,
        }]
    );

    let envelopes = events.get_events();
    assert!(envelopes
        .windows(2)
        .all(|pair| pair[0].sequence < pair[1].sequence));
    assert!(envelopes.iter().all(|e| e.run_id == engine.run_id()));
    Ok(())
}

#[test]
fn test_config_from_yaml_drives_engine() -> pipl::Result<()> {
    let config = EngineConfig::from_yaml_str(
        "ready_queue_capacity: 16\nmax_steps: 10\ntrace_synchronizations: false\n",
    )?;
    let mut engine = Engine::with_config(config)?;
    let ping = engine.make_channel();
    let pong = engine.make_channel();

    // Two replicating forwarders bouncing one value forever
    let a = forwarder(&mut engine, ping, pong)?;
    let b = forwarder(&mut engine, pong, ping)?;
    let kick = engine.make_sequence();
    engine.add_send(kick, ping, "ball")?;

    let err = engine.run_all(&[a, b, kick]).unwrap_err();
    assert!(matches!(err, pipl::PiplError::StepLimitExceeded { limit: 10 }));
    Ok(())
}
