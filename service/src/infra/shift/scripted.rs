//! Scripted [`Shift`] double for exercising the engine without a website.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use secrecy::ExposeSecret as _;
use tracerr::Traced;

use crate::domain::{session::Cookies, Code, Form, Session};

use super::{
    Check, CheckCode, CurrentSession, Error, Login, Probe, Redemption,
    RedeemForm, SetSession, Shift,
};

/// Scripted reply to a [`CheckCode`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reply {
    /// [`Check::Invalid`] with the provided reason.
    Invalid(&'static str),

    /// [`Check::Valid`] with [`Form`]s for the provided services.
    Forms(&'static [&'static str]),

    /// Fails with the provided [`Fail`].
    Fail(Fail),
}

/// Scripted [`Error`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fail {
    /// [`Error::Network`].
    Network,

    /// [`Error::NotAuthenticated`].
    NotAuthenticated,

    /// [`Error::RateLimitExceeded`].
    RateLimited,
}

impl Fail {
    /// Converts this [`Fail`] into the [`Error`] it stands for.
    fn into_error(self) -> Error {
        match self {
            Self::Network => Error::Network("connection reset".into()),
            Self::NotAuthenticated => Error::NotAuthenticated,
            Self::RateLimited => Error::RateLimitExceeded,
        }
    }
}

/// [`Shift`] double replying according to a script and recording calls.
#[derive(Debug, Default)]
pub(crate) struct Scripted {
    /// Current [`Session`].
    session: Mutex<Option<Session>>,

    /// [`Reply`]s to [`CheckCode`]s, the last one repeating.
    checks: Mutex<HashMap<Code, VecDeque<Reply>>>,

    /// [`Redemption`]s by code and service. Succeeds if absent.
    redemptions: HashMap<(Code, &'static str), Redemption>,

    /// Number of successful [`Probe`]s before going offline.
    online_probes: Option<usize>,

    /// Number of [`Probe`]s so far.
    probes: AtomicUsize,

    /// Log of performed calls.
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    /// Creates a new [`Scripted`] double with a valid [`Session`].
    pub(crate) fn signed_in() -> Self {
        let this = Self::default();
        *this.session.lock().unwrap() = Some(session());
        this
    }

    /// Scripts the provided [`Reply`] to a [`CheckCode`] of the `code`.
    ///
    /// Multiple [`Reply`]s are replayed in order.
    pub(crate) fn on_check(self, code: &str, reply: Reply) -> Self {
        self.checks
            .lock()
            .unwrap()
            .entry(Code::new(code).unwrap())
            .or_default()
            .push_back(reply);
        self
    }

    /// Scripts the [`Redemption`] of the `code` on the `service`.
    pub(crate) fn on_redeem(
        mut self,
        code: &str,
        service: &'static str,
        redemption: Redemption,
    ) -> Self {
        drop(
            self.redemptions
                .insert((Code::new(code).unwrap(), service), redemption),
        );
        self
    }

    /// Makes the website unreachable after the provided number of
    /// [`Probe`]s.
    pub(crate) fn offline_after(mut self, probes: usize) -> Self {
        self.online_probes = Some(probes);
        self
    }

    /// Returns the log of the performed calls.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Records the provided call.
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Ensures there is a valid [`Session`].
    fn authenticated(&self) -> Result<(), Traced<Error>> {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(drop)
            .ok_or_else(|| tracerr::new!(Error::NotAuthenticated))
    }
}

/// Creates a [`Session`] valid for an hour.
pub(crate) fn session() -> Session {
    let mut cookies = Cookies::default();
    cookies.absorb("_session_id=scripted");
    Session::new(cookies, Duration::from_secs(3600))
}

impl Shift<Login> for Scripted {
    type Ok = Session;
    type Err = Traced<Error>;

    async fn execute(&self, login: Login) -> Result<Self::Ok, Self::Err> {
        self.record(format!("login {}", login.email));
        if login.password.expose_secret().as_str() == "wrong" {
            return Err(tracerr::new!(Error::InvalidCredentials));
        }
        let session = session();
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }
}

impl Shift<CheckCode> for Scripted {
    type Ok = Check;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        CheckCode(code): CheckCode,
    ) -> Result<Self::Ok, Self::Err> {
        self.authenticated()?;
        self.record(format!("check {code}"));

        let reply = {
            let mut checks = self.checks.lock().unwrap();
            let replies = checks.entry(code.clone()).or_default();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().copied()
            }
        };
        match reply.unwrap_or(Reply::Invalid("Invalid code")) {
            Reply::Invalid(reason) => Ok(Check::Invalid(reason.into())),
            Reply::Forms(services) => Ok(Check::Valid(
                services
                    .iter()
                    .map(|s| {
                        Form::new(
                            (*s).to_owned(),
                            "oak".into(),
                            code.clone(),
                            "check".into(),
                            "token".into(),
                        )
                    })
                    .collect(),
            )),
            Reply::Fail(fail) => Err(tracerr::new!(fail.into_error())),
        }
    }
}

impl Shift<RedeemForm> for Scripted {
    type Ok = Redemption;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        RedeemForm(form): RedeemForm,
    ) -> Result<Self::Ok, Self::Err> {
        self.authenticated()?;
        self.record(format!("redeem {} {}", form.code, form.service));

        let key = (form.code, form.service.as_str());
        Ok(self
            .redemptions
            .iter()
            .find(|((c, s), _)| *c == key.0 && *s == key.1)
            .map_or(Redemption::Succeeded, |(_, r)| r.clone()))
    }
}

impl Shift<Probe> for Scripted {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(&self, _: Probe) -> Result<Self::Ok, Self::Err> {
        let n = self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.online_probes.is_none_or(|limit| n < limit))
    }
}

impl Shift<CurrentSession> for Scripted {
    type Ok = Option<Session>;
    type Err = Traced<Error>;

    async fn execute(&self, _: CurrentSession) -> Result<Self::Ok, Self::Err> {
        Ok(self.session.lock().unwrap().clone().filter(|s| !s.is_expired()))
    }
}

impl Shift<SetSession> for Scripted {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        SetSession(session): SetSession,
    ) -> Result<Self::Ok, Self::Err> {
        self.record(format!("set session {}", session.is_some()));
        *self.session.lock().unwrap() = session;
        Ok(())
    }
}
