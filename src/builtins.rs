//! Functions the CLI can run by name. Worker processes serve the same table.

use std::thread;
use std::time::Duration;

use parmap_core::Registry;
use serde_json::Value;

fn square(x: Value) -> Result<Value, String> {
    match x.as_i64().and_then(|n| n.checked_mul(n)) {
        Some(n) => Ok(n.into()),
        None => Ok(float(&x)?.powi(2).into()),
    }
}

fn add(x: Value, y: Value) -> Result<Value, String> {
    match (x.as_i64(), y.as_i64()) {
        (Some(a), Some(b)) if a.checked_add(b).is_some() => Ok((a + b).into()),
        _ => Ok((float(&x)? + float(&y)?).into()),
    }
}

/// Sleep `ms`, then echo `value`. Handy for watching completion order.
fn delay(ms: u64, value: Value) -> Value {
    thread::sleep(Duration::from_millis(ms));
    value
}

/// Id of the process that ran the task.
fn pid(_item: Value) -> u32 {
    std::process::id()
}

fn fail_on(x: Value, bad: Value) -> Result<Value, String> {
    if x == bad {
        Err(format!("refusing {}", x))
    } else {
        Ok(x)
    }
}

/// f64 view of a number, for non-integers and i64 overflow.
fn float(x: &Value) -> Result<f64, String> {
    x.as_f64().ok_or_else(|| format!("expected a number, got {}", x))
}

pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_fallible("square", square)
        .register_fallible("add", add)
        .register("delay", delay)
        .register("pid", pid)
        .register_fallible("fail_on", fail_on);
    registry
}
