//! Built-in predicates.

use crate::extension::{extension, Extension};
use crate::result::{AfirmarError, AfirmarResult};
use crate::state::{StatePatch, Step};
use crate::target::Target;
use serde_json::Value;
use std::rc::Rc;

/// Record `run` against the subject, then propagate changes
fn action<F>(label: String, run: F) -> impl Extension
where
    F: Fn(&Target) -> AfirmarResult<()> + 'static,
{
    let run = Rc::new(run);
    extension(label.clone(), move |ctx| {
        let target = ctx.target().clone();
        let run = Rc::clone(&run);
        Ok(StatePatch::predicate(Step::new(
            format!("{label} on {}", target.label()),
            move || {
                run(&target)?;
                target.fixture().propagate_changes();
                Ok(())
            },
        )))
    })
    .honouring_negation()
}

/// Trigger `click` on every subject element
pub fn click() -> impl Extension {
    action("click".into(), |target| {
        for element in target.require_all()? {
            element.trigger_event("click", &[])?;
        }
        Ok(())
    })
}

/// Trigger an arbitrary event with arguments
pub fn trigger(event: impl Into<String>, args: Vec<Value>) -> impl Extension {
    let event = event.into();
    action(format!("trigger({event})"), move |target| {
        for element in target.require_all()? {
            element.trigger_event(&event, &args)?;
        }
        Ok(())
    })
}

/// Emit a value on an output of the subject component
pub fn emit(output: impl Into<String>, value: Value) -> impl Extension {
    let output = output.into();
    action(format!("emit({output})"), move |target| {
        for instance in target.instances()? {
            instance.output(&output)?.emit(value.clone())?;
        }
        Ok(())
    })
}

/// Merge fields into the subject component's state
pub fn set_state(fields: Value) -> impl Extension {
    action(format!("set_state({fields})"), move |target| {
        for instance in target.instances()? {
            instance.patch(&fields);
        }
        Ok(())
    })
}

/// Set native properties on every subject element
pub fn set_properties(fields: Value) -> impl Extension {
    action(format!("set_properties({fields})"), move |target| {
        let Value::Object(fields) = &fields else {
            return Err(AfirmarError::Misconfiguration {
                message: format!("set_properties expects a JSON object, got {fields}"),
            });
        };
        for element in target.require_all()? {
            for (name, value) in fields {
                element.set_property(name.clone(), value.clone());
            }
        }
        Ok(())
    })
}

/// Set attributes on every subject element
pub fn set_attributes<I, K, V>(pairs: I) -> impl Extension
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs: Vec<(String, String)> = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    let names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    let label = format!("set_attributes({})", names.join(", "));
    action(label, move |target| {
        for element in target.require_all()? {
            for (name, value) in &pairs {
                element.set_attribute(name.clone(), value.clone());
            }
        }
        Ok(())
    })
}

/// Call a method on the subject component
pub fn call(method: impl Into<String>, args: Vec<Value>) -> impl Extension {
    let method = method.into();
    action(format!("call({method})"), move |target| {
        for instance in target.instances()? {
            let _ = instance.call(&method, &args)?;
        }
        Ok(())
    })
}

/// Advance the fixture clock, firing due timers
pub fn wait(ms: u64) -> impl Extension {
    action(format!("wait({ms}ms)"), move |target| {
        let fired = target.fixture().clock().advance(ms);
        tracing::trace!(ms, fired, "clock advanced");
        Ok(())
    })
}

/// Only propagate changes
pub fn detect_changes() -> impl Extension {
    action("detect_changes".into(), |_| Ok(()))
}

/// Arbitrary action on the subject
pub fn act<F>(label: impl Into<String>, run: F) -> impl Extension
where
    F: Fn(&Target) -> AfirmarResult<()> + 'static,
{
    action(label.into(), run)
}

/// Run the previous predicate `times` times in total.
///
/// Each run is its own step, so pending spies are placed between runs.
pub fn repeated(times: usize) -> impl Extension {
    extension(format!("repeated({times})"), move |ctx| {
        let mut steps = ctx.state().predicates().to_vec();
        let Some(previous) = steps.pop() else {
            return Err(AfirmarError::Misconfiguration {
                message: "repeated() must follow another predicate".into(),
            });
        };
        for run in 1..=times {
            let step = previous.clone();
            steps.push(Step::new(format!("{} ({run}/{times})", previous.label()), move || step.run()));
        }
        Ok(StatePatch::new().replacing_predicates(steps))
    })
    .honouring_negation()
}
