//! Drive credential acquisition: reuse a stored token, refresh it, or run the
//! browser consent flow against a loopback redirect.
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::google::model::{ClientSecret, ClientSecretFile, Credential, TokenResp};

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read client secret {path}: {source}")]
    ClientSecretIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("client secret {path} is not valid JSON: {source}")]
    ClientSecretParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("client secret {0} has no `installed` or `web` entry")]
    ClientSecretMissing(PathBuf),
    #[error("stored credential at {path} is corrupt: {source}")]
    CorruptCredential {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("credential store I/O error at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("token endpoint rejected {grant} grant ({status}): {body}")]
    TokenEndpoint {
        grant: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to reach token endpoint: {0}")]
    Http(#[from] reqwest::Error),
    #[error("consent callback I/O error: {0}")]
    Callback(#[source] io::Error),
    #[error("consent flow failed: {0}")]
    Consent(String),
}

/// Durable home for the Drive credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>, AuthError>;
    async fn save(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// JSON file store. The file is created on the first successful
/// authorization and rewritten after every refresh.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> AuthError {
        AuthError::Store {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_err(err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| AuthError::CorruptCredential {
                path: self.path.clone(),
                source,
            })
    }

    async fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_vec_pretty(credential).map_err(|source| {
            AuthError::CorruptCredential {
                path: self.path.clone(),
                source,
            }
        })?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| self.io_err(e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_err(e))?;
        }
        debug!(path=%self.path.display(), "credential saved");
        Ok(())
    }
}

/// Read the OAuth client registration used for consent and refresh.
pub async fn read_client_secret(path: &Path) -> Result<ClientSecret, AuthError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AuthError::ClientSecretIo {
            path: path.to_path_buf(),
            source,
        })?;
    let file: ClientSecretFile =
        serde_json::from_str(&raw).map_err(|source| AuthError::ClientSecretParse {
            path: path.to_path_buf(),
            source,
        })?;
    file.into_secret()
        .ok_or_else(|| AuthError::ClientSecretMissing(path.to_path_buf()))
}

pub struct CredentialManager<S> {
    http: Client,
    store: S,
    client_secret_path: PathBuf,
    scopes: Vec<String>,
}

impl<S: CredentialStore> CredentialManager<S> {
    pub fn new(store: S, client_secret_path: impl Into<PathBuf>) -> Self {
        let http = Client::builder()
            .user_agent("drive-reading-list/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            store,
            client_secret_path: client_secret_path.into(),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
        }
    }

    /// Return a usable credential: the stored one if still valid, a refreshed
    /// one if it expired and carries a refresh token, otherwise the result of
    /// an interactive consent. New or refreshed credentials are persisted.
    #[instrument(skip_all)]
    pub async fn acquire(&self) -> Result<Credential, AuthError> {
        let stored = self.store.load().await?;
        if let Some(cred) = &stored {
            if cred.is_valid() {
                debug!("reusing stored drive credential");
                return Ok(cred.clone());
            }
        }

        let secret = read_client_secret(&self.client_secret_path).await?;
        let fresh = match stored {
            Some(cred) if cred.can_refresh() => {
                info!("drive credential expired; refreshing");
                self.refresh(&secret, cred).await?
            }
            _ => self.run_consent(&secret).await?,
        };
        self.store.save(&fresh).await?;
        Ok(fresh)
    }

    async fn refresh(&self, secret: &ClientSecret, cred: Credential) -> Result<Credential, AuthError> {
        let refresh_token = cred.refresh_token.unwrap_or_default();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];
        let resp = self
            .token_request(&secret.token_uri, "refresh_token", &form)
            .await?;
        Ok(Credential::from_token_response(
            resp,
            Some(refresh_token),
            Utc::now(),
        ))
    }

    async fn run_consent(&self, secret: &ClientSecret) -> Result<Credential, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(AuthError::Callback)?;
        let port = listener.local_addr().map_err(AuthError::Callback)?.port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = Uuid::new_v4().simple().to_string();

        let url = build_authorize_url(secret, &redirect_uri, &self.scopes, &state)?;
        // No browser is launched. The operator opens the URL on this machine,
        // since the redirect only reaches 127.0.0.1.
        info!("Please visit this URL to authorize this application: {}", url);

        let code = wait_for_callback(&listener, &state).await?;
        let cred = self.exchange_code(secret, &code, &redirect_uri).await?;
        info!("drive authorization complete");
        Ok(cred)
    }

    /// Trade the code from the consent redirect for a credential.
    /// `redirect_uri` must be the one the consent URL was built with.
    pub async fn exchange_code(
        &self,
        secret: &ClientSecret,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];
        let resp = self
            .token_request(&secret.token_uri, "authorization_code", &form)
            .await?;
        Ok(Credential::from_token_response(resp, None, Utc::now()))
    }

    async fn token_request(
        &self,
        token_uri: &str,
        grant: &'static str,
        form: &[(&str, &str)],
    ) -> Result<TokenResp, AuthError> {
        let res = self.http.post(token_uri).form(form).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                grant,
                status,
                body,
            });
        }
        Ok(res.json::<TokenResp>().await?)
    }
}

pub fn build_authorize_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> Result<Url, AuthError> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AuthError::Consent(format!("invalid auth_uri {}: {}", secret.auth_uri, e)))
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code { code: String, state: Option<String> },
    Denied(String),
    Ignored,
}

/// Parse the request line of the redirect, e.g. `GET /?code=..&state=.. HTTP/1.1`.
fn parse_callback(request_line: &str) -> Callback {
    let target = match request_line.split_whitespace().nth(1) {
        Some(t) => t,
        None => return Callback::Ignored,
    };
    let url = match Url::parse("http://127.0.0.1").and_then(|base| base.join(target)) {
        Ok(u) => u,
        Err(_) => return Callback::Ignored,
    };
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (_, Some(err)) => Callback::Denied(err),
        (Some(code), None) => Callback::Code { code, state },
        (None, None) => Callback::Ignored,
    }
}

/// Serve the loopback redirect until it yields an authorization code.
async fn wait_for_callback(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (stream, peer) = listener.accept().await.map_err(AuthError::Callback)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .await
            .map_err(AuthError::Callback)?;
        debug!(%peer, line = request_line.trim_end(), "consent callback request");
        drain_headers(&mut reader).await.map_err(AuthError::Callback)?;

        let (status, body, outcome) = match parse_callback(&request_line) {
            Callback::Ignored => ("404 Not Found", "Not found.", None),
            Callback::Denied(err) => (
                "200 OK",
                "Authorization was denied. You may close this window.",
                Some(Err(AuthError::Consent(format!("authorization denied: {}", err)))),
            ),
            Callback::Code { code, state } => {
                if state.as_deref() == Some(expected_state) {
                    (
                        "200 OK",
                        "The authentication flow has completed. You may close this window.",
                        Some(Ok(code)),
                    )
                } else {
                    warn!("consent callback state mismatch");
                    (
                        "400 Bad Request",
                        "State mismatch.",
                        Some(Err(AuthError::Consent("state mismatch in callback".into()))),
                    )
                }
            }
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        if let Err(err) = write_half.write_all(response.as_bytes()).await {
            warn!(?err, "failed to answer consent callback");
        }
        let _ = write_half.shutdown().await;

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}

async fn drain_headers<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<()> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim_end().is_empty() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    fn secret() -> ClientSecret {
        serde_json::from_str(r#"{"client_id":"cid","client_secret":"cs"}"#).unwrap()
    }

    #[test]
    fn authorize_url_carries_offline_access_and_state() {
        let url = build_authorize_url(
            &secret(),
            "http://127.0.0.1:5555/",
            &[DRIVE_READONLY_SCOPE.to_string()],
            "st4te",
        )
        .unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["redirect_uri"], "http://127.0.0.1:5555/");
        assert_eq!(pairs["scope"], DRIVE_READONLY_SCOPE);
        assert_eq!(pairs["state"], "st4te");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["response_type"], "code");
    }

    #[test]
    fn parse_callback_variants() {
        assert_eq!(
            parse_callback("GET /?state=s&code=4%2Fabc HTTP/1.1\r\n"),
            Callback::Code {
                code: "4/abc".into(),
                state: Some("s".into())
            }
        );
        assert_eq!(
            parse_callback("GET /?error=access_denied&state=s HTTP/1.1"),
            Callback::Denied("access_denied".into())
        );
        assert_eq!(parse_callback("GET /favicon.ico HTTP/1.1"), Callback::Ignored);
        assert_eq!(parse_callback(""), Callback::Ignored);
    }

    async fn browser_hit(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let req = format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", path);
        stream.write_all(req.as_bytes()).await.unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn callback_skips_stray_requests_and_returns_code() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let browser = tokio::spawn(async move {
            let first = browser_hit(port, "/favicon.ico").await;
            let second = browser_hit(port, "/?code=the-code&state=expected").await;
            (first, second)
        });

        let code = wait_for_callback(&listener, "expected").await.unwrap();
        assert_eq!(code, "the-code");
        let (first, second) = browser.await.unwrap();
        assert!(first.starts_with("HTTP/1.1 404"));
        assert!(second.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn callback_rejects_state_mismatch() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let browser = tokio::spawn(async move { browser_hit(port, "/?code=c&state=other").await });

        let err = wait_for_callback(&listener, "expected").await.unwrap_err();
        assert!(matches!(err, AuthError::Consent(_)));
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 400"));
    }

    #[tokio::test]
    async fn file_store_round_trip_and_missing_file() {
        let td = tempdir().unwrap();
        let store = FileCredentialStore::new(td.path().join("nested").join("token.json"));
        assert!(store.load().await.unwrap().is_none());

        let cred = Credential {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            expires_at: None,
            token_type: "Bearer".into(),
            scope: Some(DRIVE_READONLY_SCOPE.into()),
        };
        store.save(&cred).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(cred));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn corrupt_store_is_an_auth_error() {
        let td = tempdir().unwrap();
        let path = td.path().join("token.json");
        std::fs::write(&path, "access_token=abc").unwrap();
        let err = FileCredentialStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AuthError::CorruptCredential { .. }));
    }

    #[tokio::test]
    async fn missing_client_secret_is_reported() {
        let td = tempdir().unwrap();
        let err = read_client_secret(&td.path().join("credentials.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ClientSecretIo { .. }));

        let p = td.path().join("empty.json");
        std::fs::write(&p, "{}").unwrap();
        let err = read_client_secret(&p).await.unwrap_err();
        assert!(matches!(err, AuthError::ClientSecretMissing(_)));
    }
}
