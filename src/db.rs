//! The shared keyspace: a map from key to a tagged value (string,
//! list, or stream), TTL bookkeeping for strings, the stream id
//! allocator, and the `BLPOP` waiter coordinator.
//!
//! All of it lives behind one `std::sync::Mutex`-guarded `State`, so a
//! single lock acquisition is the linearization point for every
//! command — that's what makes the push/wake hand-off in `on_push`
//! atomic with respect to every other reader.
//!
//! The mutex is a `std::sync::Mutex`, not Tokio's: no `.await` ever
//! happens while it's held, and the critical sections here are all
//! short, non-blocking operations on in-memory collections.

use tokio::sync::{oneshot, Notify};
use tokio::time::{self, Duration, Instant};

use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::frame::Frame;

/// A shared handle to the server's keyspace. Cloning is shallow — it
/// just bumps an `Arc` refcount.
#[derive(Clone)]
pub(crate) struct Db {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    /// Wakes the background expiry sweep when an earlier-than-current
    /// expiration is scheduled, or when the `Db` is shutting down.
    background_task: Notify,
}

struct State {
    entries: HashMap<String, Value>,
    /// FIFO queues of suspended `BLPOP` waiters, one per list key.
    waiters: HashMap<String, VecDeque<Waiter>>,
    /// String TTLs, ordered by expiry so the background sweep only
    /// ever has to look at the front of the map. Keyed by `(when, id)`
    /// because two expirations can land on the same `Instant`.
    expirations: BTreeMap<(Instant, u64), String>,
    /// Shared source of unique ids: string TTL tie-breaking and waiter
    /// identity both draw from it.
    next_id: u64,
}

enum Value {
    Str {
        data: Bytes,
        expires_at: Option<Instant>,
        id: u64,
    },
    List(VecDeque<Bytes>),
    Stream(Vec<StreamEntry>),
}

struct StreamEntry {
    id: StreamId,
    fields: Vec<(Bytes, Bytes)>,
}

/// A stream entry id: a pair of non-negative integers compared
/// lexicographically on `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// What the caller asked `XADD` to do about the sequence part of the id.
enum SeqSpec {
    Explicit(u64),
    Auto,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<Bytes>,
}

/// A handle a suspended `BLPOP` caller holds so it can cancel itself on
/// timeout or disconnect.
pub(crate) struct WaiterHandle {
    key: String,
    id: u64,
    rx: oneshot::Receiver<Bytes>,
}

impl WaiterHandle {
    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn into_receiver(self) -> oneshot::Receiver<Bytes> {
        self.rx
    }
}

/// Why a waiter is being removed from its FIFO. Both map to the same
/// removal; only the caller's resulting reply differs (§4.4).
pub(crate) enum CancelReason {
    Timeout,
    Closed,
}

pub(crate) enum BlpopOutcome {
    Immediate(Bytes),
    Suspended(WaiterHandle),
}

/// Errors produced by keyspace, stream, and coordinator operations.
///
/// Every variant here maps to a reply frame and leaves the connection
/// open — unlike a framing-level `ProtocolError`, which closes it.
#[derive(Debug, Clone)]
pub(crate) enum CommandError {
    UnknownCommand(String),
    WrongArity(String),
    TypeMismatch,
    InvalidArgument(String),
    /// Carries the exact, wire-mandated `XADD` error text.
    StreamId(String),
}

impl CommandError {
    pub(crate) fn into_frame(self) -> Frame {
        let msg = match self {
            CommandError::UnknownCommand(name) => format!("ERR unknown command '{}'", name),
            CommandError::WrongArity(name) => {
                format!("ERR wrong number of arguments for '{}'", name)
            }
            CommandError::TypeMismatch => {
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
            }
            CommandError::InvalidArgument(msg) => format!("ERR {}", msg),
            CommandError::StreamId(msg) => msg,
        };
        Frame::Error(msg)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.clone().into_frame())
    }
}

impl std::error::Error for CommandError {}

/// No-count and counted `LPOP` have different reply shapes; the
/// dispatcher command turns this into the right `Frame`.
pub(crate) enum LpopReply {
    Single(Option<Bytes>),
    Counted(Vec<Bytes>),
}

impl Db {
    pub(crate) fn new() -> Db {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                entries: HashMap::new(),
                waiters: HashMap::new(),
                expirations: BTreeMap::new(),
                next_id: 0,
            }),
            background_task: Notify::new(),
        });

        tokio::spawn(purge_expired_task(Arc::downgrade(&shared)));

        Db { shared }
    }

    // ---- strings ----

    /// Returns `None` both when the key is absent and when it holds a
    /// non-string value. Used by `TYPE`, which wants a uniform "none"
    /// outcome rather than a type error.
    pub(crate) fn get_string(&self, key: &str) -> Option<Bytes> {
        let mut state = self.shared.state.lock().unwrap();
        match take_if_expired(&mut state, key) {
            Some(Value::Str { data, .. }) => Some(data),
            _ => None,
        }
    }

    /// Same lookup as `get_string`, but a non-string value is a
    /// `TypeMismatch` error rather than silently `None` — this is what
    /// `GET` wants per invariant 1's general type-checking rule.
    pub(crate) fn get_string_checked(&self, key: &str) -> Result<Option<Bytes>, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        match state.entries.get(key) {
            Some(Value::Str { expires_at, .. }) if is_expired(*expires_at) => {
                state.entries.remove(key);
                Ok(None)
            }
            Some(Value::Str { data, .. }) => Ok(Some(data.clone())),
            Some(_) => Err(CommandError::TypeMismatch),
            None => Ok(None),
        }
    }

    pub(crate) fn set_string(&self, key: String, value: Bytes, ttl: Option<Duration>) {
        let mut state = self.shared.state.lock().unwrap();

        let id = state.next_id;
        state.next_id += 1;

        let mut notify = false;
        let expires_at = ttl.map(|duration| {
            let when = Instant::now() + duration;
            notify = state
                .next_expiration()
                .map(|expiration| expiration > when)
                .unwrap_or(true);
            state.expirations.insert((when, id), key.clone());
            when
        });

        let prev = state.entries.insert(
            key,
            Value::Str {
                data: value,
                expires_at,
                id,
            },
        );

        if let Some(Value::Str {
            expires_at: Some(when),
            id: prev_id,
            ..
        }) = prev
        {
            state.expirations.remove(&(when, prev_id));
        }

        drop(state);

        if notify {
            self.shared.background_task.notify_one();
        }
    }

    // ---- type ----

    pub(crate) fn type_of(&self, key: &str) -> &'static str {
        let mut state = self.shared.state.lock().unwrap();
        match take_if_expired(&mut state, key) {
            Some(Value::Str { .. }) => "string",
            Some(Value::List(_)) => "list",
            Some(Value::Stream(_)) => "stream",
            None => "none",
        }
    }

    // ---- lists ----

    pub(crate) fn rpush(&self, key: &str, values: Vec<Bytes>) -> Result<usize, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        let list = get_or_create_list(&mut state, key)?;
        for v in values {
            list.push_back(v);
        }
        let len = list.len();
        on_push(&mut state, key);
        prune_if_empty_list(&mut state, key);
        Ok(len)
    }

    pub(crate) fn lpush(&self, key: &str, values: Vec<Bytes>) -> Result<usize, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        let list = get_or_create_list(&mut state, key)?;
        for v in values {
            list.push_front(v);
        }
        let len = list.len();
        on_push(&mut state, key);
        prune_if_empty_list(&mut state, key);
        Ok(len)
    }

    pub(crate) fn lpop(&self, key: &str, count: Option<i64>) -> Result<LpopReply, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        purge_expired_str(&mut state, key);
        let list = match state.entries.get_mut(key) {
            Some(Value::List(l)) => l,
            Some(_) => return Err(CommandError::TypeMismatch),
            None => {
                return Ok(match count {
                    None => LpopReply::Single(None),
                    Some(_) => LpopReply::Counted(Vec::new()),
                })
            }
        };

        let reply = match count {
            None => LpopReply::Single(list.pop_front()),
            Some(n) if n <= 0 => LpopReply::Counted(Vec::new()),
            Some(n) => {
                let n = n as usize;
                let mut out = Vec::with_capacity(n.min(list.len()));
                for _ in 0..n {
                    match list.pop_front() {
                        Some(v) => out.push(v),
                        None => break,
                    }
                }
                LpopReply::Counted(out)
            }
        };

        prune_if_empty_list(&mut state, key);
        Ok(reply)
    }

    pub(crate) fn llen(&self, key: &str) -> Result<usize, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        purge_expired_str(&mut state, key);
        match state.entries.get(key) {
            Some(Value::List(l)) => Ok(l.len()),
            Some(_) => Err(CommandError::TypeMismatch),
            None => Ok(0),
        }
    }

    pub(crate) fn lrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<Bytes>, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        purge_expired_str(&mut state, key);
        let list = match state.entries.get(key) {
            Some(Value::List(l)) => l,
            Some(_) => return Err(CommandError::TypeMismatch),
            None => return Ok(Vec::new()),
        };

        let len = list.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }

        let norm = |i: i64| -> i64 {
            if i < 0 {
                len + i
            } else {
                i
            }
        };
        let start = norm(start).max(0);
        let stop = norm(stop).min(len - 1);

        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    // ---- streams ----

    pub(crate) fn xadd(
        &self,
        key: &str,
        requested_id: &str,
        fields: Vec<(Bytes, Bytes)>,
    ) -> Result<String, CommandError> {
        let (ms, seq_spec) = parse_stream_id(requested_id)?;

        if let SeqSpec::Explicit(seq) = seq_spec {
            if ms == 0 && seq == 0 {
                return Err(CommandError::StreamId(
                    "ERR The ID specified in XADD must be greater than 0-0".to_string(),
                ));
            }
        }

        let mut state = self.shared.state.lock().unwrap();
        purge_expired_str(&mut state, key);

        match state.entries.get(key) {
            None | Some(Value::Stream(_)) => {}
            Some(_) => return Err(CommandError::TypeMismatch),
        }

        let last_id = match state.entries.get(key) {
            Some(Value::Stream(entries)) => entries.last().map(|e| e.id),
            _ => None,
        };

        let equal_or_smaller = || {
            CommandError::StreamId(
                "ERR The ID specified in XADD is equal or smaller than the target stream top item"
                    .to_string(),
            )
        };

        let resolved = match seq_spec {
            SeqSpec::Explicit(seq) => StreamId { ms, seq },
            SeqSpec::Auto => match last_id {
                None => {
                    if ms == 0 {
                        StreamId { ms: 0, seq: 1 }
                    } else {
                        StreamId { ms, seq: 0 }
                    }
                }
                Some(last) => {
                    if ms > last.ms {
                        StreamId { ms, seq: 0 }
                    } else if ms == last.ms {
                        StreamId {
                            ms,
                            seq: last.seq + 1,
                        }
                    } else {
                        return Err(equal_or_smaller());
                    }
                }
            },
        };

        if let Some(last) = last_id {
            if resolved <= last {
                return Err(equal_or_smaller());
            }
        }

        match state.entries.entry(key.to_string()).or_insert_with(|| Value::Stream(Vec::new())) {
            Value::Stream(entries) => entries.push(StreamEntry {
                id: resolved,
                fields,
            }),
            _ => unreachable!("type checked above"),
        }

        Ok(resolved.to_string())
    }

    // ---- BLPOP coordination ----

    pub(crate) fn try_pop_or_enqueue(&self, key: &str) -> Result<BlpopOutcome, CommandError> {
        let mut state = self.shared.state.lock().unwrap();
        purge_expired_str(&mut state, key);

        let popped = match state.entries.get_mut(key) {
            Some(Value::List(l)) => l.pop_front(),
            Some(_) => return Err(CommandError::TypeMismatch),
            None => None,
        };

        if let Some(item) = popped {
            prune_if_empty_list(&mut state, key);
            return Ok(BlpopOutcome::Immediate(item));
        }

        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = oneshot::channel();
        state
            .waiters
            .entry(key.to_string())
            .or_insert_with(VecDeque::new)
            .push_back(Waiter { id, tx });

        Ok(BlpopOutcome::Suspended(WaiterHandle {
            key: key.to_string(),
            id,
            rx,
        }))
    }

    /// Removes the waiter identified by `(key, id)` from its FIFO if
    /// it's still there.
    ///
    /// Returns `true` if the removal happened here — the caller should
    /// treat `reason` as having taken effect (timeout or disconnect).
    /// Returns `false` when a concurrent `on_push` already removed the
    /// waiter and sent it an item under the same lock; the item is
    /// already sitting in the waiter's channel in that case, so the
    /// caller should receive it instead of discarding it — this is how
    /// the "exactly one of the two outcomes" rule from the design
    /// notes is enforced: both paths take the same mutex, so whichever
    /// gets there first wins outright.
    pub(crate) fn cancel(&self, key: &str, id: u64, _reason: CancelReason) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        let removed = if let Some(queue) = state.waiters.get_mut(key) {
            if let Some(idx) = queue.iter().position(|w| w.id == id) {
                queue.remove(idx);
                true
            } else {
                false
            }
        } else {
            false
        };

        if removed {
            if state.waiters.get(key).map_or(false, |q| q.is_empty()) {
                state.waiters.remove(key);
            }
        }
        removed
    }

    // ---- whole-keyspace ----

    pub(crate) fn flush_all(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.entries.clear();
        state.expirations.clear();
        // Waking every waiter with an empty `Bytes` would misrepresent
        // a real popped value, so waiters are simply dropped: their
        // channel closes, and the BLPOP caller's `select!` observes
        // the closed receiver and replies with a null array, same as
        // an ordinary timeout/disconnect path.
        state.waiters.clear();
    }
}

fn take_if_expired(state: &mut State, key: &str) -> Option<Value> {
    match state.entries.get(key) {
        Some(Value::Str { expires_at, .. }) if is_expired(*expires_at) => {
            state.entries.remove(key);
            None
        }
        Some(_) => {
            // Cloning would require `Value: Clone`; instead, reborrow
            // to produce a lightweight tag-only view via `get`.
            match state.entries.get(key).unwrap() {
                Value::Str { data, .. } => Some(Value::Str {
                    data: data.clone(),
                    expires_at: None,
                    id: 0,
                }),
                Value::List(_) => Some(Value::List(VecDeque::new())),
                Value::Stream(_) => Some(Value::Stream(Vec::new())),
            }
        }
        None => None,
    }
}

fn is_expired(expires_at: Option<Instant>) -> bool {
    expires_at.map_or(false, |when| when <= Instant::now())
}

/// Removes `key` if it holds an expired `Str`, leaving any other value
/// (or an already-absent key) untouched.
///
/// Every operation that inspects a key's value tag before creating or
/// operating on a non-string value must call this first — otherwise an
/// expired string is indistinguishable from a live one until the
/// background sweep happens to reach it, and a command like `RPUSH`
/// sees a stale `Str` where it should see an absent key.
fn purge_expired_str(state: &mut State, key: &str) {
    if let Some(Value::Str { expires_at, .. }) = state.entries.get(key) {
        if is_expired(*expires_at) {
            state.entries.remove(key);
        }
    }
}

fn get_or_create_list<'s>(
    state: &'s mut State,
    key: &str,
) -> Result<&'s mut VecDeque<Bytes>, CommandError> {
    purge_expired_str(state, key);
    if !state.entries.contains_key(key) {
        state.entries.insert(key.to_string(), Value::List(VecDeque::new()));
    }
    match state.entries.get_mut(key) {
        Some(Value::List(l)) => Ok(l),
        _ => Err(CommandError::TypeMismatch),
    }
}

/// Hands pushed items directly to waiting `BLPOP` callers, in FIFO
/// order, until either the list or the waiter queue is empty. Runs
/// inside the same critical section as the push that triggered it, so
/// "list longer and a waiter still queued" is never an externally
/// observable state (invariant 5).
fn on_push(state: &mut State, key: &str) {
    loop {
        let has_waiter = state.waiters.get(key).map_or(false, |q| !q.is_empty());
        if !has_waiter {
            return;
        }

        let item = match state.entries.get_mut(key) {
            Some(Value::List(l)) => l.pop_front(),
            _ => None,
        };
        let item = match item {
            Some(item) => item,
            None => return,
        };

        let waiter = state.waiters.get_mut(key).unwrap().pop_front().unwrap();
        if let Err(item) = waiter.tx.send(item) {
            // The receiver side was dropped without going through
            // `cancel` (e.g. a panicked task). Put the item back at
            // the head of the list and try the next waiter so nothing
            // is lost.
            if let Some(Value::List(l)) = state.entries.get_mut(key) {
                l.push_front(item);
            }
        }
    }
}

fn prune_if_empty_list(state: &mut State, key: &str) {
    if let Some(Value::List(l)) = state.entries.get(key) {
        if l.is_empty() {
            state.entries.remove(key);
        }
    }
}

fn parse_stream_id(raw: &str) -> Result<(u64, SeqSpec), CommandError> {
    let bad_format = || {
        CommandError::StreamId(
            "ERR The ID specified in XADD must be in the format timestamp-sequence_number or timestamp-*"
                .to_string(),
        )
    };

    let (ms_part, seq_part) = raw.split_once('-').ok_or_else(bad_format)?;
    let ms: u64 = ms_part.parse().map_err(|_| bad_format())?;

    if seq_part == "*" {
        return Ok((ms, SeqSpec::Auto));
    }

    let seq: u64 = seq_part.parse().map_err(|_| bad_format())?;
    Ok((ms, SeqSpec::Explicit(seq)))
}

impl State {
    fn next_expiration(&self) -> Option<Instant> {
        self.expirations.keys().next().map(|(when, _)| *when)
    }
}

impl Shared {
    fn purge_expired_keys(&self) -> Option<Instant> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        while let Some((&(when, id), key)) = state.expirations.iter().next() {
            if when > now {
                return Some(when);
            }
            let key = key.clone();
            state.entries.remove(&key);
            state.expirations.remove(&(when, id));
        }
        None
    }
}

/// Sweeps expired string keys until every `Db` handle referencing
/// `shared` has been dropped. Holding only a `Weak` here — rather than
/// cloning `Db`'s `Arc` into the task — means this task can never be
/// the thing keeping the keyspace alive: once the listener's `Db` and
/// every connection's clone are gone, `upgrade()` starts failing and
/// the task exits on its own.
async fn purge_expired_task(shared: std::sync::Weak<Shared>) {
    loop {
        let shared = match shared.upgrade() {
            Some(shared) => shared,
            None => return,
        };

        if let Some(when) = shared.purge_expired_keys() {
            tokio::select! {
                _ = time::sleep_until(when) => {}
                _ = shared.background_task.notified() => {}
            }
        } else {
            shared.background_task.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), None);
        assert_eq!(db.get_string_checked("k").unwrap(), Some(Bytes::from("v")));
    }

    #[tokio::test]
    async fn get_on_absent_key_is_none() {
        let db = Db::new();
        assert_eq!(db.get_string_checked("missing").unwrap(), None);
    }

    #[tokio::test]
    async fn set_px_zero_expires_immediately() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), Some(Duration::from_millis(0)));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(db.get_string_checked("k").unwrap(), None);
    }

    #[tokio::test]
    async fn rpush_on_expired_string_key_replaces_it() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), Some(Duration::from_millis(0)));
        std::thread::sleep(std::time::Duration::from_millis(5));
        // the background sweep hasn't necessarily run yet; rpush must
        // still see this as an absent key, not a type mismatch
        let len = db.rpush("k", vec![Bytes::from("x")]).unwrap();
        assert_eq!(len, 1);
        assert_eq!(db.lrange("k", 0, -1).unwrap(), vec![Bytes::from("x")]);
    }

    #[tokio::test]
    async fn list_ops_on_expired_string_key_behave_as_absent() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), Some(Duration::from_millis(0)));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(db.llen("k").unwrap(), 0);
        assert_eq!(db.lrange("k", 0, -1).unwrap(), Vec::<Bytes>::new());
        assert!(matches!(db.lpop("k", None).unwrap(), LpopReply::Single(None)));
        assert!(matches!(
            db.try_pop_or_enqueue("k").unwrap(),
            BlpopOutcome::Suspended(_)
        ));
    }

    #[tokio::test]
    async fn xadd_on_expired_string_key_creates_fresh_stream() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), Some(Duration::from_millis(0)));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(db.xadd("k", "1-1", vec![]).unwrap(), "1-1");
    }

    #[tokio::test]
    async fn rpush_then_lrange() {
        let db = Db::new();
        db.rpush("l", vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")])
            .unwrap();
        let all = db.lrange("l", 0, -1).unwrap();
        assert_eq!(all, vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
    }

    #[tokio::test]
    async fn lpush_prepends_in_argument_order() {
        let db = Db::new();
        db.lpush("k", vec![Bytes::from("x"), Bytes::from("y"), Bytes::from("z")])
            .unwrap();
        let all = db.lrange("k", 0, -1).unwrap();
        assert_eq!(all, vec![Bytes::from("z"), Bytes::from("y"), Bytes::from("x")]);
    }

    #[tokio::test]
    async fn lpop_with_count() {
        let db = Db::new();
        db.rpush("l", vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")])
            .unwrap();
        match db.lpop("l", Some(2)).unwrap() {
            LpopReply::Counted(v) => assert_eq!(v, vec![Bytes::from("a"), Bytes::from("b")]),
            _ => panic!("expected counted reply"),
        }
        assert_eq!(db.lrange("l", 0, -1).unwrap(), vec![Bytes::from("c")]);
    }

    #[tokio::test]
    async fn type_mismatch_on_wrong_kind() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), None);
        assert!(matches!(db.rpush("k", vec![Bytes::from("x")]), Err(CommandError::TypeMismatch)));
        assert!(matches!(db.llen("k"), Err(CommandError::TypeMismatch)));
    }

    #[tokio::test]
    async fn xadd_rejects_zero_zero() {
        let db = Db::new();
        assert!(matches!(
            db.xadd("s", "0-0", vec![]),
            Err(CommandError::StreamId(_))
        ));
    }

    #[tokio::test]
    async fn xadd_monotonicity_and_autoseq() {
        let db = Db::new();
        assert_eq!(db.xadd("s", "1-1", vec![]).unwrap(), "1-1");
        assert!(matches!(db.xadd("s", "1-1", vec![]), Err(CommandError::StreamId(_))));
        assert_eq!(db.xadd("s", "1-*", vec![]).unwrap(), "1-2");
        assert_eq!(db.xadd("s", "2-*", vec![]).unwrap(), "2-0");
    }

    #[tokio::test]
    async fn xadd_autoseq_on_empty_stream() {
        let db = Db::new();
        assert_eq!(db.xadd("t", "0-*", vec![]).unwrap(), "0-1");
        assert_eq!(db.xadd("t", "0-*", vec![]).unwrap(), "0-2");
        assert_eq!(db.xadd("t", "1-*", vec![]).unwrap(), "1-0");
    }

    #[tokio::test]
    async fn blpop_immediate_pop_when_nonempty() {
        let db = Db::new();
        db.rpush("q", vec![Bytes::from("hello")]).unwrap();
        match db.try_pop_or_enqueue("q").unwrap() {
            BlpopOutcome::Immediate(v) => assert_eq!(v, Bytes::from("hello")),
            _ => panic!("expected immediate"),
        }
    }

    #[tokio::test]
    async fn blpop_wakes_on_push() {
        let db = Db::new();
        let handle = match db.try_pop_or_enqueue("q").unwrap() {
            BlpopOutcome::Suspended(h) => h,
            _ => panic!("expected suspended"),
        };
        let rx = handle.into_receiver();
        db.rpush("q", vec![Bytes::from("hello")]).unwrap();
        assert_eq!(rx.await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn cancel_removes_waiter() {
        let db = Db::new();
        let handle = match db.try_pop_or_enqueue("q").unwrap() {
            BlpopOutcome::Suspended(h) => h,
            _ => panic!("expected suspended"),
        };
        assert!(db.cancel(handle.key(), handle.id(), CancelReason::Timeout));
        // a push afterwards must not find a waiter to hand off to
        db.rpush("q", vec![Bytes::from("x")]).unwrap();
        assert_eq!(db.lrange("q", 0, -1).unwrap(), vec![Bytes::from("x")]);
    }

    #[tokio::test]
    async fn fifo_fairness_among_waiters() {
        let db = Db::new();
        let a = match db.try_pop_or_enqueue("q").unwrap() {
            BlpopOutcome::Suspended(h) => h,
            _ => panic!(),
        };
        let b = match db.try_pop_or_enqueue("q").unwrap() {
            BlpopOutcome::Suspended(h) => h,
            _ => panic!(),
        };
        db.rpush("q", vec![Bytes::from("v")]).unwrap();
        let mut a_rx = a.into_receiver();
        let mut b_rx = b.into_receiver();
        assert!(a_rx.try_recv().is_ok());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn flush_all_clears_keyspace() {
        let db = Db::new();
        db.set_string("k".into(), Bytes::from("v"), None);
        db.rpush("l", vec![Bytes::from("a")]).unwrap();
        db.flush_all();
        assert_eq!(db.get_string_checked("k").unwrap(), None);
        assert_eq!(db.type_of("l"), "none");
    }
}
