//! End-to-end sync between sessions sharing an in-memory authority.
//!
//! The authority keeps the committed rows and the delta log, accepts a push
//! only against its current revision, and answers snapshot, delta and
//! long-poll requests the way the real service does.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rowsync_client::{
    ApiRequest, ApiResponse, AwaitOutcome, ClientError, PushOutcome, RetryStrategy, SyncConfig,
    SyncSession, Transport, TransportError,
};
use rowsync_core::{Document, IdPolicy, Record, RowTable, SequentialIds};
use rowsync_types::{AwaitCursors, Change, Datum, Delta, Endpoint, Handle, Revision};
use serde_json::{json, Value as Json};

const HANDLE: &str = "S3PZkSHSN5hdl48RWCXMPHOeBVv92A";

#[derive(Debug, Default)]
struct AuthorityState {
    tables: BTreeMap<String, RowTable>,
    log: Vec<Delta>,
}

impl AuthorityState {
    fn rev(&self) -> u64 {
        self.log.len() as u64
    }

    fn deltas_since(&self, rev: u64) -> Vec<Delta> {
        self.log
            .iter()
            .filter(|d| d.rev.value() >= rev)
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> Json {
        let rows: Vec<Json> = self
            .tables
            .iter()
            .flat_map(|(tid, table)| {
                table
                    .save()
                    .into_iter()
                    .map(move |(rowid, data)| json!({"tid": tid, "rowid": rowid, "data": data}))
            })
            .collect();
        json!({"rows": rows, "rev": self.rev()})
    }

    fn commit(&mut self, changes: Vec<Change>) -> u64 {
        for change in &changes {
            self.tables
                .entry(change.table_id.clone())
                .or_insert_with(|| RowTable::new(&change.table_id, Arc::new(SequentialIds::new("srv"))))
                .apply_change(change)
                .expect("authority rejected a change");
        }
        let rev = Revision::new(self.rev());
        self.log.push(Delta { rev, changes });
        self.rev()
    }
}

/// Authority reachable through the `Transport` trait.
#[derive(Debug, Clone, Default)]
struct Authority {
    state: Arc<Mutex<AuthorityState>>,
}

impl Authority {
    fn rev(&self) -> u64 {
        self.state.lock().unwrap().rev()
    }
}

fn param<'a>(request: &'a ApiRequest, name: &str) -> &'a str {
    request.params.get(name).map(String::as_str).unwrap_or_default()
}

#[async_trait]
impl Transport for Authority {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().unwrap();

        if request.endpoint != Endpoint::Await && param(&request, "handle") != HANDLE {
            return Ok(ApiResponse::ok(json!({"notfound": true})));
        }

        let body = match request.endpoint {
            Endpoint::GetSnapshot => state.snapshot(),
            Endpoint::GetDeltas => {
                let rev: u64 = param(&request, "rev").parse().unwrap();
                json!({"deltas": state.deltas_since(rev)})
            }
            Endpoint::PutDelta => {
                let rev: u64 = param(&request, "rev").parse().unwrap();
                if rev != state.rev() {
                    json!({"conflict": true})
                } else {
                    let changes: Vec<Change> =
                        serde_json::from_str(param(&request, "changes")).unwrap();
                    json!({"rev": state.commit(changes)})
                }
            }
            Endpoint::Await => {
                let cursors: AwaitCursors =
                    serde_json::from_str(param(&request, "get_deltas")).unwrap();
                let rev = cursors.cursors.get(HANDLE).map(Revision::value).unwrap_or(0);
                let deltas = state.deltas_since(rev);
                if deltas.is_empty() {
                    return Err(TransportError::Timeout);
                }
                let mut by_handle = serde_json::Map::new();
                by_handle.insert(HANDLE.to_string(), json!({ "deltas": deltas }));
                json!({"get_deltas": {"deltas": by_handle}})
            }
        };
        Ok(ApiResponse::ok(body))
    }
}

fn session(authority: &Authority, config: SyncConfig) -> SyncSession<Authority> {
    SyncSession::create("default", Handle::new(HANDLE), authority.clone(), config)
}

fn tags(items: &[&str]) -> Datum {
    Datum::List(items.iter().map(|t| Datum::from(*t)).collect())
}

fn tables(session: &SyncSession<Authority>) -> Json {
    session.save().unwrap()["tables"].clone()
}

#[tokio::test]
async fn two_sessions_converge() {
    let authority = Authority::default();
    let mut alice = session(&authority, SyncConfig::new());
    let mut bob = session(&authority, SyncConfig::new());

    let mut task = Document::with_id("t1")
        .with("title", "write report")
        .with("tags", tags(&["work", "urgent"]));
    let applied = alice
        .transaction()
        .run(|s| {
            s.table("tasks").insert(&mut task, IdPolicy::Require)?;
            Ok::<_, ClientError>(())
        })
        .await
        .unwrap();
    assert!(applied);

    bob.pull().await.unwrap();
    let seen: Document = bob.table("tasks").get("t1").unwrap().unwrap();
    assert_eq!(seen.get("tags"), Some(&tags(&["work", "urgent"])));

    let edited = seen
        .with("tags", tags(&["urgent", "home", "work"]))
        .with("done", true);
    assert!(bob.table("tasks").update(&edited).unwrap());
    assert_eq!(bob.push().await.unwrap(), PushOutcome::Applied);

    alice.pull().await.unwrap();
    assert_eq!(alice.revision(), bob.revision());
    assert_eq!(alice.revision(), Revision::new(authority.rev()));
    assert_eq!(tables(&alice), tables(&bob));

    let mine: Document = alice.table("tasks").get("t1").unwrap().unwrap();
    assert_eq!(mine.get("tags"), Some(&tags(&["urgent", "home", "work"])));
    assert_eq!(mine.get("done"), Some(&Datum::Bool(true)));
}

#[tokio::test]
async fn resend_cannot_overcome_a_real_conflict() {
    let authority = Authority::default();
    let mut alice = session(&authority, SyncConfig::new());
    let mut bob = session(&authority, SyncConfig::new().with_max_retries(3));

    let mut first = Document::with_id("a");
    alice.table("t").insert(&mut first, IdPolicy::Require).unwrap();
    alice.push().await.unwrap();
    bob.pull().await.unwrap();

    alice.table("t").remove("a");
    alice.push().await.unwrap();

    let applied = bob
        .transaction()
        .run(|s| {
            s.table("t").update(&Document::with_id("a").with("n", 1i64))?;
            Ok::<_, ClientError>(())
        })
        .await
        .unwrap();

    assert!(!applied);
    assert!(bob.has_pending_changes());
    assert_eq!(authority.rev(), 2);
}

#[tokio::test]
async fn rederive_resolves_conflict() {
    let authority = Authority::default();
    let mut alice = session(&authority, SyncConfig::new());
    let mut bob = session(
        &authority,
        SyncConfig::new()
            .with_max_retries(2)
            .with_retry_strategy(RetryStrategy::Rederive),
    );

    let mut counter = Document::with_id("c").with("n", 0i64);
    alice.table("counters").insert(&mut counter, IdPolicy::Require).unwrap();
    alice.push().await.unwrap();
    bob.pull().await.unwrap();

    alice
        .table("counters")
        .update(&Document::with_id("c").with("n", 1i64))
        .unwrap();
    alice.push().await.unwrap();

    let applied = bob
        .transaction()
        .run(|s| {
            let table = s.table("counters");
            let current: Document = table.get("c")?.expect("counter row");
            let n = match current.get("n") {
                Some(Datum::Integer(n)) => *n,
                _ => 0,
            };
            table.update(&current.with("n", n + 1))?;
            Ok::<_, ClientError>(())
        })
        .await
        .unwrap();
    assert!(applied);

    alice.pull().await.unwrap();
    let final_count: Document = alice.table("counters").get("c").unwrap().unwrap();
    assert_eq!(final_count.get("n"), Some(&Datum::Integer(2)));
    assert_eq!(tables(&alice), tables(&bob));
}

#[tokio::test]
async fn await_delivers_remote_changes() {
    let authority = Authority::default();
    let mut alice = session(&authority, SyncConfig::new());
    let mut bob = session(&authority, SyncConfig::new());

    let mut doc = Document::new().with("title", "ping");
    alice.table("msgs").insert(&mut doc, IdPolicy::Generate).unwrap();
    alice.push().await.unwrap();
    bob.pull().await.unwrap();

    assert_eq!(bob.await_deltas().await.unwrap(), AwaitOutcome::Unchanged);

    alice
        .table("msgs")
        .update(&doc.clone().with("title", "pong"))
        .unwrap();
    alice.push().await.unwrap();

    assert_eq!(bob.await_deltas().await.unwrap(), AwaitOutcome::Changed);
    let id = doc.id().unwrap().to_string();
    let seen: Document = bob.table("msgs").get(&id).unwrap().unwrap();
    assert_eq!(seen.get("title"), Some(&Datum::from("pong")));
}

#[tokio::test]
async fn hydrated_session_catches_up() {
    let authority = Authority::default();
    let mut alice = session(&authority, SyncConfig::new());

    let mut doc = Document::with_id("x").with("v", 1i64);
    alice.table("t").insert(&mut doc, IdPolicy::Require).unwrap();
    alice.push().await.unwrap();
    let saved = alice.save().unwrap();

    alice
        .table("t")
        .update(&Document::with_id("x").with("v", 2i64))
        .unwrap();
    alice.push().await.unwrap();

    let mut restored = SyncSession::hydrate(saved, authority.clone(), SyncConfig::new()).unwrap();
    assert_eq!(restored.revision(), Revision::new(1));
    restored.pull().await.unwrap();

    assert_eq!(restored.revision(), alice.revision());
    assert_eq!(tables(&restored), tables(&alice));
}

#[tokio::test]
async fn unknown_store_is_not_found() {
    let authority = Authority::default();
    let mut stranger = SyncSession::create(
        "other",
        Handle::new("nope"),
        authority.clone(),
        SyncConfig::new(),
    );

    assert!(matches!(
        stranger.pull().await,
        Err(ClientError::NotFound { ref store }) if store == "other"
    ));
}
