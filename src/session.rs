//! Server-side sessions.
//!
//! The browser only holds a random id in the `vidify.sid` cookie. Who is signed in and where to
//! go after login are kept in a [`SessionStore`] managed by Rocket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use rocket::fairing::AdHoc;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use uuid::Uuid;

use crate::role::Role;
use crate::util;

pub const SESSION_COOKIE: &str = "vidify.sid";

const SESSION_ID_BYTES: usize = 32;
const PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Who a session belongs to. A session is signed in as at most one role.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Identity {
    #[default]
    Anonymous,
    Teacher(Uuid),
    Student(Uuid),
}

impl Identity {
    pub fn new(role: Role, id: Uuid) -> Identity {
        match role {
            Role::Teacher => Identity::Teacher(id),
            Role::Student => Identity::Student(id),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Anonymous => None,
            Identity::Teacher(_) => Some(Role::Teacher),
            Identity::Student(_) => Some(Role::Student),
        }
    }

    pub fn teacher_id(&self) -> Option<Uuid> {
        match self {
            Identity::Teacher(id) => Some(*id),
            _ => None,
        }
    }

    pub fn student_id(&self) -> Option<Uuid> {
        match self {
            Identity::Student(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub identity: Identity,
    /// Path an anonymous visitor was turned away from.
    pub return_to: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionState {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionState>>,
    lifetime: chrono::Duration,
}

impl SessionStore {
    pub fn new(lifetime_days: i64) -> SessionStore {
        SessionStore {
            sessions: Arc::new(DashMap::new()),
            lifetime: chrono::Duration::days(lifetime_days.max(1)),
        }
    }

    fn fresh(&self) -> SessionState {
        SessionState {
            identity: Identity::Anonymous,
            return_to: None,
            expires_at: Utc::now() + self.lifetime,
        }
    }

    fn insert(&self, state: SessionState) -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let id = util::base64_engine().encode(bytes);

        self.sessions.insert(id.clone(), state);
        id
    }

    /// Starts an anonymous session and returns its id.
    pub fn issue(&self) -> String {
        self.insert(self.fresh())
    }

    /// Replaces `previous` with a new session signed in as `identity`. A pending return path
    /// carries over, the old id stops resolving.
    pub fn reissue(&self, previous: Option<&str>, identity: Identity) -> String {
        let return_to = previous
            .and_then(|id| self.sessions.remove(id))
            .and_then(|(_, state)| state.return_to);

        self.insert(SessionState {
            identity,
            return_to,
            ..self.fresh()
        })
    }

    /// State of a live session. Expired sessions are dropped on access.
    pub fn get(&self, id: &str) -> Option<SessionState> {
        let state = self.sessions.get(id).map(|it| it.value().clone())?;
        if state.is_expired(Utc::now()) {
            self.sessions.remove(id);
            return None;
        }
        Some(state)
    }

    fn update<T>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut entry = self
            .sessions
            .entry(id.to_string())
            .or_insert_with(|| self.fresh());
        f(entry.value_mut())
    }

    /// Like `update`, but never creates a session.
    fn modify<T>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> T) -> Option<T> {
        self.sessions.get_mut(id).map(|mut entry| f(entry.value_mut()))
    }

    pub fn remove(&self, id: &str) -> Option<SessionState> {
        self.sessions.remove(id).map(|(_, state)| state)
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, state| !state.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn cookie(&self, id: String) -> Cookie<'static> {
        let max_age = rocket::time::Duration::seconds(self.lifetime.num_seconds());
        Cookie::build((SESSION_COOKIE, id))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age)
            .build()
    }
}

/// Periodically removes expired sessions once the server is running.
pub fn purge_fairing() -> AdHoc {
    AdHoc::on_liftoff("Session purge", |rocket| {
        Box::pin(async move {
            let store = match rocket.state::<SessionStore>() {
                Some(store) => store.clone(),
                None => {
                    tracing::warn!("no session store managed, purge disabled");
                    return;
                }
            };

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PURGE_INTERVAL);
                loop {
                    interval.tick().await;
                    let removed = store.purge_expired();
                    if removed > 0 {
                        tracing::info!("Purged {} expired sessions", removed);
                    }
                }
            });
        })
    })
}

/// Session id resolved for the current request, shared by every guard in it.
struct SessionSlot(Mutex<Option<String>>);

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The current request's session. Reading never creates anything; an id and cookie are handed
/// out on the first write.
pub struct Session<'r> {
    slot: &'r SessionSlot,
    store: &'r SessionStore,
    cookies: &'r CookieJar<'r>,
}

impl<'r> Session<'r> {
    fn current(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    fn write<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let mut slot = self.slot.lock();
        let id = match slot.as_ref() {
            Some(id) => id.clone(),
            None => {
                let id = self.store.issue();
                self.cookies.add(self.store.cookie(id.clone()));
                *slot = Some(id.clone());
                id
            }
        };
        self.store.update(&id, f)
    }

    pub fn identity(&self) -> Identity {
        self.current()
            .and_then(|id| self.store.get(&id))
            .map(|it| it.identity)
            .unwrap_or_default()
    }

    /// Signs in under a new session id. The previous id is discarded.
    pub fn sign_in(&self, identity: Identity) {
        tracing::debug!("session signed in as {:?}", identity);
        let mut slot = self.slot.lock();
        let id = self.store.reissue(slot.as_deref(), identity);
        self.cookies.add(self.store.cookie(id.clone()));
        *slot = Some(id);
    }

    /// Drops the identity but keeps a pending return path.
    pub fn clear_identity(&self) {
        if let Some(id) = self.current() {
            self.store
                .modify(&id, |state| state.identity = Identity::Anonymous);
        }
    }

    /// Back to anonymous. Any pending return path is dropped as well.
    pub fn sign_out(&self) {
        if let Some(id) = self.slot.lock().take() {
            self.store.remove(&id);
            self.cookies.remove(SESSION_COOKIE);
        }
    }

    pub fn remember_path(&self, path: impl Into<String>) {
        let path = path.into();
        self.write(|state| state.return_to = Some(path));
    }

    pub fn take_return_to(&self) -> Option<String> {
        let id = self.current()?;
        self.store
            .modify(&id, |state| state.return_to.take())
            .flatten()
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity())
            .finish()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session<'r> {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let store = try_outcome!(req.guard::<&State<SessionStore>>().await).inner();

        let slot = req.local_cache(|| {
            let live = req
                .cookies()
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .filter(|id| store.get(id).is_some());
            SessionSlot(Mutex::new(live))
        });

        Outcome::Success(Session {
            slot,
            store,
            cookies: req.cookies(),
        })
    }
}
