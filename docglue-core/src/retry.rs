//! Transparent retry layer over driver handles.
//!
//! Wrapping a [`Connection`] in a [`ResilientConnection`] makes every
//! remote call made through it — including each individual cursor
//! advancement — subject to the retry policy: transient errors are
//! logged and retried with linearly growing backoff, permanent errors
//! propagate immediately, and exhausting the attempt budget re-raises
//! the last transient error unchanged in kind.
//!
//! The wrappers implement the driver traits themselves, so a proxied
//! handle composes anywhere a raw one does. Navigation (`database`,
//! `collection`) always returns a wrapped child, whether or not the
//! name exists yet; lazy creation stays the store's job.
//!
//! # Example
//!
//! ```ignore
//! let conn = ResilientConnection::new(raw_connection, RetryPolicy::default());
//! let users = conn.database("app").collection("users");
//! // Retried on connection loss, call by call:
//! for doc in users.find(None)? {
//!     let doc = doc?;
//! }
//! ```

use std::{fmt, sync::Arc, thread, time::Duration};

use bson::{Document, oid::ObjectId};
use std::collections::HashMap;
use tracing::warn;

use crate::{
    driver::{Collection, Connection, Database},
    error::{DriverError, DriverResult},
    index::{IndexInfo, IndexKeys, IndexOptions},
};

/// Whether a failed call may be re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying: connectivity loss or a non-permanent conflict.
    Transient,
    /// Propagate immediately: uniqueness violations and everything
    /// else.
    Fatal,
}

type Classifier = Arc<dyn Fn(&DriverError) -> ErrorClass + Send + Sync>;

/// Default classification: lost connections are transient, operation
/// failures are transient unless the message indicates a duplicate-key
/// violation, everything else is fatal.
pub fn classify_default(err: &DriverError) -> ErrorClass {
    match err {
        DriverError::ConnectionLost(_) => ErrorClass::Transient,
        DriverError::OperationFailed(_) if !err.is_duplicate_key() => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Retry configuration: attempt cap, backoff base, and error
/// classifier.
///
/// An explicit value passed to the proxy constructors; process-wide
/// defaults come only from [`RetryPolicy::default`] at the outermost
/// composition point. The default policy caps at 18 attempts with a
/// 200 ms backoff base.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    classifier: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 18,
            base_delay: Duration::from_millis(200),
            classifier: Arc::new(classify_default),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// A policy with the default classifier and the given limits.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Replaces the error classifier.
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&DriverError) -> ErrorClass + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Classifies a driver error under this policy.
    pub fn classify(&self, err: &DriverError) -> ErrorClass {
        (self.classifier)(err)
    }

    /// Delay slept before the given attempt number. Grows linearly.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Runs `op` under the retry policy.
///
/// Attempt numbers start at 1. On a transient error the attempt is
/// logged at `warn` level and the thread sleeps for the backoff delay
/// before re-issuing the call. Once the attempt cap is exceeded the
/// last error is returned as-is, so callers can still distinguish the
/// failure kind.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> DriverResult<T>,
) -> DriverResult<T> {
    let mut attempt: u32 = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if policy.classify(&err) == ErrorClass::Fatal {
                    return Err(err);
                }
                warn!(attempt, error = %err, "retrying driver call after transient failure");
                attempt += 1;
                if attempt > policy.max_attempts() {
                    return Err(err);
                }
                thread::sleep(policy.backoff(attempt));
            }
        }
    }
}

/// A [`Connection`] whose calls are retried on transient errors.
#[derive(Debug, Clone)]
pub struct ResilientConnection<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: Connection> ResilientConnection<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Known child names at this level: database names.
    pub fn names(&self) -> DriverResult<Vec<String>> {
        with_retry(&self.policy, || self.inner.database_names())
    }
}

impl<C: Connection> Connection for ResilientConnection<C> {
    type Database = ResilientDatabase<C::Database>;

    fn database(&self, name: &str) -> Self::Database {
        ResilientDatabase {
            inner: self.inner.database(name),
            policy: self.policy.clone(),
        }
    }

    fn database_names(&self) -> DriverResult<Vec<String>> {
        with_retry(&self.policy, || self.inner.database_names())
    }
}

/// A [`Database`] whose calls are retried on transient errors.
#[derive(Debug, Clone)]
pub struct ResilientDatabase<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D: Database> ResilientDatabase<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Known child names at this level: collection names.
    pub fn names(&self) -> DriverResult<Vec<String>> {
        with_retry(&self.policy, || self.inner.collection_names())
    }
}

impl<D: Database> Database for ResilientDatabase<D> {
    type Collection = ResilientCollection<D::Collection>;

    fn collection(&self, name: &str) -> Self::Collection {
        ResilientCollection {
            inner: self.inner.collection(name),
            policy: self.policy.clone(),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        with_retry(&self.policy, || self.inner.collection_names())
    }

    fn drop_collection(&self, name: &str) -> DriverResult<()> {
        with_retry(&self.policy, || self.inner.drop_collection(name))
    }
}

/// A [`Collection`] whose calls are retried on transient errors.
///
/// Cursors returned by [`find`] are themselves wrapped, so a long
/// iteration that intermittently loses connectivity resumes
/// transparently, re-issuing only the failed advancement.
///
/// [`find`]: Collection::find
#[derive(Debug, Clone)]
pub struct ResilientCollection<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: Collection> ResilientCollection<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Known child names at this level: sibling collections that start
    /// with `<self>.`, reported with the prefix stripped.
    pub fn names(&self) -> DriverResult<Vec<String>> {
        let prefix = format!("{}.", self.inner.name());
        let siblings = with_retry(&self.policy, || self.inner.collection_names())?;
        Ok(siblings
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

impl<C: Collection> Collection for ResilientCollection<C> {
    type Cursor = ResilientCursor<C::Cursor>;

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn collection(&self, name: &str) -> Self {
        ResilientCollection {
            inner: self.inner.collection(name),
            policy: self.policy.clone(),
        }
    }

    fn collection_names(&self) -> DriverResult<Vec<String>> {
        with_retry(&self.policy, || self.inner.collection_names())
    }

    fn insert(&self, document: Document) -> DriverResult<ObjectId> {
        with_retry(&self.policy, || self.inner.insert(document.clone()))
    }

    fn find(&self, filter: Option<Document>) -> DriverResult<Self::Cursor> {
        let cursor = with_retry(&self.policy, || self.inner.find(filter.clone()))?;
        Ok(ResilientCursor {
            inner: cursor,
            policy: self.policy.clone(),
        })
    }

    fn find_one(&self, filter: Option<Document>) -> DriverResult<Option<Document>> {
        with_retry(&self.policy, || self.inner.find_one(filter.clone()))
    }

    fn update(&self, filter: Document, update: Document) -> DriverResult<()> {
        with_retry(&self.policy, || {
            self.inner.update(filter.clone(), update.clone())
        })
    }

    fn remove(&self, filter: Option<Document>) -> DriverResult<()> {
        with_retry(&self.policy, || self.inner.remove(filter.clone()))
    }

    fn drop(&self) -> DriverResult<()> {
        with_retry(&self.policy, || self.inner.drop())
    }

    fn ensure_index(&self, keys: &IndexKeys, options: &IndexOptions) -> DriverResult<String> {
        with_retry(&self.policy, || self.inner.ensure_index(keys, options))
    }

    fn index_information(&self) -> DriverResult<HashMap<String, IndexInfo>> {
        with_retry(&self.policy, || self.inner.index_information())
    }
}

/// A cursor whose advancement calls are individually retried.
#[derive(Debug)]
pub struct ResilientCursor<I> {
    inner: I,
    policy: RetryPolicy,
}

impl<I> Iterator for ResilientCursor<I>
where
    I: Iterator<Item = DriverResult<Document>>,
{
    type Item = DriverResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = &mut self.inner;
        with_retry(&self.policy, || match inner.next() {
            Some(Ok(document)) => Ok(Some(document)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        })
        .transpose()
    }
}
