//! Basic circuit breaker usage example

use circuit_machines::{CircuitBreaker, Context, ManualClock, Outcome};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== Circuit Breaker Basic Example ===\n");

    // Drive time by hand so the example does not sleep
    let clock = Arc::new(ManualClock::new());

    // Create a circuit with builder API
    let circuit = CircuitBreaker::<String, String>::builder("payment_api")
        .consecutive_failures(3)
        .duration_of_break(Duration::from_secs(5))
        .clock(clock.clone())
        .on_break(|fault, duration, ctx| {
            println!(
                "🔴 Circuit opened for {:?} by {:?} ({:?})",
                duration,
                fault,
                ctx.operation_key()
            )
        })
        .on_reset(|_ctx| println!("🟢 Circuit closed!"))
        .on_half_open(|| println!("🟡 Circuit half-open, testing..."))
        .build()
        .expect("valid circuit configuration");

    println!("Initial state: {}\n", circuit.state());

    // Simulate successful calls
    println!("--- Successful calls ---");
    for i in 1..=2 {
        call(&circuit, move || Ok(format!("Payment {}", i)));
    }
    println!("State: {}\n", circuit.state());

    // Simulate failures
    println!("--- Triggering failures ---");
    for i in 1..=3 {
        call(&circuit, move || Err(format!("Payment failed {}", i)));
    }
    println!("State: {} (circuit opened)\n", circuit.state());

    // Try calling while open
    println!("--- Attempting call while open ---");
    call(&circuit, || Ok("Should be rejected".to_string()));
    println!();

    // Let the break expire and send a trial call
    println!("--- Waiting out the break ---");
    clock.advance(Duration::from_secs(5));
    call(&circuit, || Ok("Trial payment".to_string()));
    println!("State: {}\n", circuit.state());

    // Isolate and reset manually
    println!("--- Isolating circuit ---");
    circuit.isolate(&Context::with_operation_key("maintenance"));
    call(&circuit, || Ok("Should be rejected".to_string()));
    circuit.reset(&Context::new());
    println!("State after reset: {}", circuit.state());
}

fn call(circuit: &CircuitBreaker<String, String>, operation: impl FnOnce() -> Result<String, String>) {
    if let Err(e) = circuit.permit() {
        println!("✗ {}", e);
        return;
    }

    let ctx = Context::with_operation_key("charge");
    match operation() {
        Ok(result) => {
            println!("✓ {}", result);
            circuit.record_outcome(Outcome::Success, &ctx);
        }
        Err(e) => {
            println!("✗ Error: {}", e);
            circuit.record_outcome(Outcome::error(e), &ctx);
        }
    }
}
