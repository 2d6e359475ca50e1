//! HTTP [`Client`] of the SHiFT website.

use common::DateTime;
use reqwest::{
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, LOCATION,
        ORIGIN, REFERER, SET_COOKIE, USER_AGENT,
    },
    redirect, RequestBuilder, Response, StatusCode,
};
use secrecy::ExposeSecret as _;
use tokio::{sync::RwLock, time};
use tracerr::Traced;
use tracing as log;

use crate::domain::{session::Cookies, Session};

use super::{
    Check, CheckCode, Config, CurrentSession, Error, Html, Interpreter, Login,
    Marker, Probe, Redemption, RedeemForm, SetSession, Shift, Throttle,
};

/// `User-Agent` presented to the website.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// `Accept` header of page requests.
const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;\
    q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Value of the `utf8` form field Rails expects.
const UTF8_MARK: &str = "\u{2713}";

/// HTTP [`Client`] of the SHiFT website.
///
/// Holds the current [`Session`] and spaces out code checks and redemptions
/// with a shared [`Throttle`].
#[derive(Debug)]
pub struct Client<I = Html> {
    /// [`Config`] of this [`Client`].
    config: Config,

    /// Underlying HTTP client.
    http: reqwest::Client,

    /// Current [`Session`], if signed in.
    session: RwLock<Option<Session>>,

    /// [`Throttle`] of code checks and redemptions.
    throttle: Throttle,

    /// [`Interpreter`] of the website pages.
    interpreter: I,
}

impl Client {
    /// Creates a new [`Client`] understanding the website [`Html`].
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be initialized.
    pub fn new(config: Config) -> Result<Self, Traced<Error>> {
        Self::with_interpreter(config, Html)
    }
}

impl<I> Client<I> {
    /// Creates a new [`Client`] with the provided [`Interpreter`].
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be initialized.
    pub fn with_interpreter(
        mut config: Config,
        interpreter: I,
    ) -> Result<Self, Traced<Error>> {
        let mut headers = HeaderMap::new();
        drop(headers.insert(
            USER_AGENT,
            HeaderValue::from_static(BROWSER_USER_AGENT),
        ));
        drop(headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT)));
        drop(headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        ));

        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(network)
            .map_err(tracerr::wrap!())?;

        config.base_url = config.base_url.trim_end_matches('/').to_owned();

        Ok(Self {
            throttle: Throttle::new(config.request_delay),
            config,
            http,
            session: RwLock::new(None),
            interpreter,
        })
    }

    /// Returns the absolute URL of the provided website `path`.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Returns the `Cookie` header of the current [`Session`].
    ///
    /// # Errors
    ///
    /// With [`Error::NotAuthenticated`] if there is no unexpired [`Session`].
    async fn session_cookie(&self) -> Result<String, Traced<Error>> {
        self.session
            .read()
            .await
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.cookies.header())
            .ok_or_else(|| tracerr::new!(Error::NotAuthenticated))
    }

    /// Sends the request built by the provided `request` once the
    /// [`Throttle`] allows, repeating it while the website responds with
    /// `429 Too Many Requests`.
    async fn send_throttled(
        &self,
        request: impl Fn() -> RequestBuilder,
    ) -> Result<Response, Traced<Error>> {
        let mut retries = 0;
        loop {
            self.throttle.wait().await;
            let response = request()
                .send()
                .await
                .map_err(network)
                .map_err(tracerr::wrap!())?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            if retries >= self.config.rate_limit_retries {
                log::warn!(
                    "SHiFT website is still rate limiting after {retries} \
                     retries, giving up",
                );
                return Err(tracerr::new!(Error::RateLimitExceeded));
            }
            retries += 1;
            log::warn!(
                "SHiFT website is rate limiting, retrying in {:?} \
                 ({retries}/{})",
                self.config.rate_limit_delay,
                self.config.rate_limit_retries,
            );
            time::sleep(self.config.rate_limit_delay).await;
        }
    }
}

impl<I: Interpreter> Shift<Login> for Client<I> {
    type Ok = Session;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Login { email, password }: Login,
    ) -> Result<Self::Ok, Self::Err> {
        let home_url = self.url("/home");

        let home = self
            .http
            .get(&home_url)
            .send()
            .await
            .map_err(network)
            .map_err(tracerr::wrap!())?;
        if !home.status().is_success() {
            return Err(tracerr::new!(Error::Unreachable(
                home.status().as_u16()
            )));
        }
        let mut cookies = Cookies::default();
        absorb_cookies(&mut cookies, &home);
        let page = home
            .text()
            .await
            .map_err(network)
            .map_err(tracerr::wrap!())?;

        let email_str: &str = email.as_ref();
        let tokens = self
            .interpreter
            .login_tokens(&page)
            .ok_or_else(|| tracerr::new!(Error::AuthTokenMissing))?;

        let response = self
            .http
            .post(self.url("/sessions"))
            .header(COOKIE, cookies.header())
            .header(ORIGIN, &self.config.base_url)
            .header(REFERER, &home_url)
            .header("X-CSRF-Token", &tokens.csrf)
            .form(&[
                ("utf8", UTF8_MARK),
                ("authenticity_token", tokens.form.as_str()),
                ("user[email]", email_str),
                ("user[password]", password.expose_secret().as_str()),
                ("commit", "SIGN IN"),
            ])
            .send()
            .await
            .map_err(network)
            .map_err(tracerr::wrap!())?;
        absorb_cookies(&mut cookies, &response);

        let status = response.status();
        let signed_in = match status {
            StatusCode::FOUND => {
                location(&response).is_some_and(|l| l.contains("/account"))
            }
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(network)
                    .map_err(tracerr::wrap!())?;
                if self
                    .interpreter
                    .matches(&body, Marker::InvalidCredentials)
                {
                    return Err(tracerr::new!(Error::InvalidCredentials));
                }
                self.interpreter.matches(&body, Marker::SignedIn)
            }
            _ => false,
        };
        if !signed_in {
            return Err(tracerr::new!(Error::LoginRejected(status.as_u16())));
        }

        let session = Session::new(cookies, self.config.session_lifetime);
        log::info!(
            "signed into SHiFT as `{email}` with {} cookies, session assumed \
             valid until {}",
            session.cookies.len(),
            session.expires_at,
        );
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }
}

impl<I: Interpreter> Shift<CheckCode> for Client<I> {
    type Ok = Check;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        CheckCode(code): CheckCode,
    ) -> Result<Self::Ok, Self::Err> {
        let cookie = self.session_cookie().await?;
        let url = self.url("/entitlement_offer_codes");
        let code_str: &str = code.as_ref();

        let response = self
            .send_throttled(|| {
                self.http
                    .get(&url)
                    .query(&[("code", code_str)])
                    .header(COOKIE, &cookie)
                    .header(ACCEPT, "*/*")
                    .header("X-Requested-With", "XMLHttpRequest")
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("checking `{code}` failed with status {status}");
            return Ok(Check::Invalid(format!("HTTP {}", status.as_u16())));
        }
        let body = response
            .text()
            .await
            .map_err(network)
            .map_err(tracerr::wrap!())?;

        if self.interpreter.matches(&body, Marker::InvalidCode) {
            return Ok(Check::Invalid("Invalid code".into()));
        }
        if self.interpreter.matches(&body, Marker::CheckedAlreadyRedeemed) {
            return Ok(Check::Invalid("Already redeemed".into()));
        }
        if self.interpreter.matches(&body, Marker::Expired) {
            return Ok(Check::Invalid("Code expired".into()));
        }

        let forms = self.interpreter.redemption_forms(&body);
        log::debug!("`{code}` is redeemable with {} forms", forms.len());
        Ok(Check::Valid(forms))
    }
}

impl<I: Interpreter> Shift<RedeemForm> for Client<I> {
    type Ok = Redemption;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        RedeemForm(form): RedeemForm,
    ) -> Result<Self::Ok, Self::Err> {
        let cookie = self.session_cookie().await?;
        let url = self.url("/code_redemptions");
        let referer = self.url("/rewards");
        let commit = format!("Redeem for {}", form.platform);
        let code: &str = form.code.as_ref();
        let fields = [
            ("utf8", UTF8_MARK),
            ("authenticity_token", form.token.as_str()),
            ("archway_code_redemption[code]", code),
            ("archway_code_redemption[check]", form.check.as_str()),
            ("archway_code_redemption[service]", form.service.as_str()),
            ("archway_code_redemption[title]", form.title.as_str()),
            ("commit", commit.as_str()),
        ];

        let response = self
            .send_throttled(|| {
                self.http
                    .post(&url)
                    .header(COOKIE, &cookie)
                    .header(ORIGIN, &self.config.base_url)
                    .header(REFERER, &referer)
                    .form(&fields)
            })
            .await?;

        let status = response.status();
        if status == StatusCode::FOUND
            && location(&response).is_some_and(|l| {
                l.contains("/rewards") || l.contains("/code_redemptions/")
            })
        {
            return Ok(Redemption::Succeeded);
        }

        let body = response
            .text()
            .await
            .map_err(network)
            .map_err(tracerr::wrap!())?;
        Ok(if self.interpreter.matches(&body, Marker::AlreadyRedeemed) {
            Redemption::Failed("Already redeemed".into())
        } else if self.interpreter.matches(&body, Marker::Expired) {
            Redemption::Failed("Code expired".into())
        } else if status == StatusCode::OK
            || self.interpreter.matches(&body, Marker::Rewards)
        {
            Redemption::Succeeded
        } else {
            log::debug!("unrecognized redemption response: {status}");
            Redemption::Failed("Unknown error".into())
        })
    }
}

impl<I> Shift<Probe> for Client<I> {
    type Ok = bool;
    type Err = Traced<Error>;

    async fn execute(&self, _: Probe) -> Result<Self::Ok, Self::Err> {
        // Any response at all means the website is reachable.
        Ok(match self.http.head(&self.config.base_url).send().await {
            Ok(_) => true,
            Err(e) => {
                log::debug!("SHiFT website is unreachable: {e}");
                false
            }
        })
    }
}

impl<I> Shift<CurrentSession> for Client<I> {
    type Ok = Option<Session>;
    type Err = Traced<Error>;

    async fn execute(&self, _: CurrentSession) -> Result<Self::Ok, Self::Err> {
        Ok(self.session.read().await.clone().filter(|s| !s.is_expired()))
    }
}

impl<I> Shift<SetSession> for Client<I> {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        SetSession(session): SetSession,
    ) -> Result<Self::Ok, Self::Err> {
        match &session {
            Some(s) => log::debug!(
                "using SHiFT session created at {}, expiring at {}",
                s.created_at,
                s.expires_at,
            ),
            None => log::debug!("dropping SHiFT session at {}", DateTime::now()),
        }
        *self.session.write().await = session;
        Ok(())
    }
}

/// Converts a [`reqwest::Error`] into an [`Error::Network`].
fn network(e: reqwest::Error) -> Error {
    Error::Network(Box::new(e))
}

/// Returns the `Location` header of the provided [`Response`].
fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION)?.to_str().ok()
}

/// Merges `Set-Cookie` headers of the provided [`Response`] into `cookies`.
fn absorb_cookies(cookies: &mut Cookies, response: &Response) {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .for_each(|v| cookies.absorb(v));
}
