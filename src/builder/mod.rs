//! Composable configuration builders
//!
//! A builder operation ([`Op`]) mutates one kind of record and may fail.
//! Failures are not raised: [`apply`] tags each one with the record's
//! [`ErrorKind`] and the operation's field name and collects it, then keeps
//! going. Callers inspect or validate the collected errors later.
//!
//! Operations are typed by their target, so a list of container operations
//! cannot accidentally contain a host operation.

pub mod container;
pub mod host;
pub mod network;
pub mod platform;
pub mod project;
pub mod service;

use crate::container::{ContainerConfig, EndpointSettings, HostConfig, NetworkingConfig, Platform};
use crate::error::{ConfigError, ErrorKind};
use crate::project::{NetworkDefinition, ServiceConfig, VolumeDefinition};
use std::fmt;
use std::sync::Arc;

/// A record that builder operations can target
pub trait Target {
    /// Kind attached to errors raised while building this record
    const KIND: ErrorKind;
}

impl Target for ContainerConfig {
    const KIND: ErrorKind = ErrorKind::Container;
}

impl Target for HostConfig {
    const KIND: ErrorKind = ErrorKind::Host;
}

impl Target for NetworkingConfig {
    const KIND: ErrorKind = ErrorKind::Network;
}

impl Target for EndpointSettings {
    const KIND: ErrorKind = ErrorKind::Network;
}

impl Target for Platform {
    const KIND: ErrorKind = ErrorKind::Platform;
}

impl Target for ServiceConfig {
    const KIND: ErrorKind = ErrorKind::Service;
}

impl Target for NetworkDefinition {
    const KIND: ErrorKind = ErrorKind::Project;
}

impl Target for VolumeDefinition {
    const KIND: ErrorKind = ErrorKind::Project;
}

type SetFn<T> = dyn Fn(&mut T) -> Result<(), String> + Send + Sync;
type Predicate = dyn Fn() -> bool + Send + Sync;

enum OpKind<T> {
    Set { field: String, set: Arc<SetFn<T>> },
    When { predicate: Arc<Predicate>, ops: Vec<Op<T>> },
    Fail { field: String, message: String },
}

/// A reusable operation on a `T`
pub struct Op<T> {
    kind: OpKind<T>,
}

impl<T> Clone for Op<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            OpKind::Set { field, set } => OpKind::Set {
                field: field.clone(),
                set: Arc::clone(set),
            },
            OpKind::When { predicate, ops } => OpKind::When {
                predicate: Arc::clone(predicate),
                ops: ops.clone(),
            },
            OpKind::Fail { field, message } => OpKind::Fail {
                field: field.clone(),
                message: message.clone(),
            },
        };
        Self { kind }
    }
}

impl<T> fmt::Debug for Op<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OpKind::Set { field, .. } => f.debug_struct("Op::Set").field("field", field).finish(),
            OpKind::When { ops, .. } => f.debug_struct("Op::When").field("ops", &ops.len()).finish(),
            OpKind::Fail { field, message } => f
                .debug_struct("Op::Fail")
                .field("field", field)
                .field("message", message)
                .finish(),
        }
    }
}

impl<T: Target> Op<T> {
    /// Operation setting `field`; an `Err` message becomes a collected error
    pub fn new<F>(field: impl Into<String>, set: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            kind: OpKind::Set {
                field: field.into(),
                set: Arc::new(set),
            },
        }
    }

    /// Operation that cannot fail
    pub fn infallible<F>(field: impl Into<String>, set: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self::new(field, move |target| {
            set(target);
            Ok(())
        })
    }

    /// Apply `ops` only when `predicate` holds at apply time
    pub fn when<P, I, O>(predicate: P, ops: I) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
        I: IntoIterator<Item = O>,
        O: Into<Option<Op<T>>>,
    {
        Self {
            kind: OpKind::When {
                predicate: Arc::new(predicate),
                ops: ops.into_iter().filter_map(|op| op.into()).collect(),
            },
        }
    }

    /// Operation that always records `message` against `field`
    pub fn fail(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Fail {
                field: field.into(),
                message: message.into(),
            },
        }
    }

    /// [`Op::fail`] with a formatted message
    pub fn failf(field: impl Into<String>, args: fmt::Arguments<'_>) -> Self {
        Self::fail(field, args.to_string())
    }

    /// Turn a composition-time result into an operation
    ///
    /// Used by setters that parse their input up front: a parse failure is
    /// carried into the accumulation path instead of being returned.
    pub fn or_fail(field: impl Into<String>, op: Result<Op<T>, String>) -> Self {
        op.unwrap_or_else(|message| Self::fail(field, message))
    }

    fn run(&self, target: &mut T, errors: &mut Vec<ConfigError>) {
        match &self.kind {
            OpKind::Set { field, set } => {
                if let Err(message) = set(target) {
                    errors.push(ConfigError::new(T::KIND, field.as_str(), message));
                }
            }
            OpKind::When { predicate, ops } => {
                if predicate() {
                    for op in ops {
                        op.run(target, errors);
                    }
                }
            }
            OpKind::Fail { field, message } => {
                errors.push(ConfigError::new(T::KIND, field.as_str(), message.as_str()));
            }
        }
    }
}

/// Apply every operation in order, collecting failures
///
/// `None` entries are skipped. A failing operation does not stop the ones
/// after it.
pub fn apply<T, I, O>(target: &mut T, ops: I) -> Vec<ConfigError>
where
    T: Target,
    I: IntoIterator<Item = O>,
    O: Into<Option<Op<T>>>,
{
    let mut errors = Vec::new();
    for op in ops {
        let op: Option<Op<T>> = op.into();
        if let Some(op) = op {
            op.run(target, &mut errors);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Record {
        a: u32,
        b: u32,
        c: u32,
    }

    impl Target for Record {
        const KIND: ErrorKind = ErrorKind::Service;
    }

    fn set_a(v: u32) -> Op<Record> {
        Op::infallible("a", move |r: &mut Record| r.a = v)
    }

    #[test]
    fn test_apply_no_ops() {
        let mut record = Record::default();
        let errors = apply(&mut record, Vec::<Op<Record>>::new());
        assert!(errors.is_empty());
        assert_eq!(record.a, 0);
    }

    #[test]
    fn test_none_is_skipped() {
        let mut record = Record::default();
        let errors = apply(&mut record, [Some(set_a(3)), None]);
        assert!(errors.is_empty());
        assert_eq!(record.a, 3);
    }

    #[test]
    fn test_accumulation_does_not_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = |field: &'static str, fail: bool| {
            let calls = Arc::clone(&calls);
            Op::new(field, move |r: &mut Record| {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    return Err("boom".to_string());
                }
                r.c += 1;
                Ok(())
            })
        };

        let mut record = Record::default();
        let errors = apply(
            &mut record,
            [
                counted("first", false),
                counted("second", true),
                counted("third", false),
                counted("fourth", false),
            ],
        );

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(record.c, 3);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "second");
        assert_eq!(errors[0].kind, ErrorKind::Service);
        assert_eq!(errors[0].message, "boom");
    }

    #[test]
    fn test_when_evaluated_at_apply_time() {
        let flag = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&flag);
        let op = Op::when(move || gate.load(Ordering::SeqCst), [set_a(7)]);

        let mut record = Record::default();
        apply(&mut record, [op.clone()]);
        assert_eq!(record.a, 0);

        flag.store(true, Ordering::SeqCst);
        apply(&mut record, [op]);
        assert_eq!(record.a, 7);
    }

    #[test]
    fn test_fail_injects_error() {
        let mut record = Record::default();
        let errors = apply(
            &mut record,
            [
                Op::fail("b", "not allowed"),
                Op::failf("c", format_args!("value {} too large", 9)),
                set_a(1),
            ],
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].message, "value 9 too large");
        assert_eq!(record.a, 1);
        assert_eq!(record.b, 0);
    }

    #[test]
    fn test_or_fail() {
        let ok: Result<Op<Record>, String> = Ok(set_a(2));
        let err: Result<Op<Record>, String> = Err("bad input".to_string());
        let mut record = Record::default();
        let errors = apply(&mut record, [Op::or_fail("a", ok), Op::or_fail("a", err)]);
        assert_eq!(record.a, 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "bad input");
    }
}
