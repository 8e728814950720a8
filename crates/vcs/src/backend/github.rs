//! GitHub REST API backend.

use crate::VcsBackend;
use crate::error::{ErrorKind, Result};
use crate::models::{TreeChange, TreeEntry, VcsFile};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use exn::ResultExt;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("confsync/", env!("CARGO_PKG_VERSION"));

/// Characters escaped inside a single path segment of a contents URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Deserialize)]
struct ContentFile {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Contents {
    File(ContentFile),
    Directory(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
struct Blob {
    content: String,
}

#[derive(Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Deserialize)]
struct PutResponse {
    content: Sha,
}

#[derive(Deserialize)]
struct RefResponse {
    object: Sha,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: Sha,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    message: &'a str,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Serialize)]
struct BlobRequest {
    content: String,
    encoding: &'static str,
}

#[derive(Serialize)]
struct TreeItem<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    /// `None` serializes as `null`, which removes the path from the tree.
    sha: Option<String>,
}

#[derive(Serialize)]
struct TreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeItem<'a>>,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

/// Map a rejected response onto an error kind.
///
/// GitHub reports stale blob SHAs as 409 and non-fast-forward ref updates as
/// 422; both are conflicts. Exhausted rate limits come back as 403 or 429.
fn classify(status: StatusCode, subject: &str, message: &str) -> ErrorKind {
    let detail = if message.is_empty() {
        subject.to_string()
    } else {
        format!("{subject}: {message}")
    };
    match status.as_u16() {
        404 => ErrorKind::NotFound(subject.to_string()),
        409 | 422 => ErrorKind::Conflict(detail),
        403 if message.to_ascii_lowercase().contains("rate limit") => ErrorKind::Network(detail),
        401 | 403 => ErrorKind::PermissionDenied(detail),
        429 | 500..=599 => ErrorKind::Network(detail),
        status => ErrorKind::Api {
            status,
            message: detail,
        },
    }
}

fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .or_raise(|| ErrorKind::InvalidResponse("content is not valid base64".to_string()))
}

/// GitHub repository backend.
///
/// Uses the contents API for single-file commits and the git data API for
/// multi-file commits. Contents are always transferred base64 encoded, so
/// files of any content survive unchanged.
///
/// # Examples
///
/// ```no_run
/// use confsync_vcs::backend::{GitHubBackend, VcsBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let github = GitHubBackend::new("github", "https://api.github.com", "acme", "config", Some("token".into()))?;
/// let head = github.get_ref("main").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitHubBackend {
    name: String,
    client: Client,
    repository_url: String,
    token: Option<String>,
}

impl GitHubBackend {
    pub fn new(
        name: impl Into<String>,
        api_url: &str,
        owner: &str,
        repository: &str,
        token: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .or_raise(|| ErrorKind::Network("could not build HTTP client".to_string()))?;
        let repository_url = format!(
            "{}/repos/{}/{}",
            api_url.trim_end_matches('/'),
            utf8_percent_encode(owner, SEGMENT),
            utf8_percent_encode(repository, SEGMENT),
        );
        Ok(Self {
            name: name.into(),
            client,
            repository_url,
            token,
        })
    }

    fn contents_url(&self, path: &str) -> Result<String> {
        let segments = path.split('/').collect::<Vec<_>>();
        if path.is_empty() || segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            exn::bail!(ErrorKind::InvalidPath(path.to_string()));
        }
        let encoded = segments
            .into_iter()
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("{}/contents/{encoded}", self.repository_url))
    }

    fn git_url(&self, tail: &str) -> String {
        format!("{}/git/{tail}", self.repository_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, subject: &str) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("request for {subject} failed")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ApiMessage>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();
        tracing::debug!(backend = %self.name, status = status.as_u16(), subject, reason = %message, "Request rejected");
        exn::bail!(classify(status, subject, &message))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, subject: &str) -> Result<T> {
        self.send(request, subject)
            .await?
            .json::<T>()
            .await
            .or_raise(|| ErrorKind::InvalidResponse(format!("unexpected body for {subject}")))
    }

    /// Files over 1MB come back from the contents API without inline content.
    async fn blob(&self, sha: &str) -> Result<Vec<u8>> {
        let url = self.git_url(&format!("blobs/{sha}"));
        let blob: Blob = self.send_json(self.request(Method::GET, &url), sha).await?;
        decode_content(&blob.content)
    }

    async fn create_blob(&self, content: &[u8], subject: &str) -> Result<String> {
        let body = BlobRequest {
            content: STANDARD.encode(content),
            encoding: "base64",
        };
        let url = self.git_url("blobs");
        let blob: Sha = self.send_json(self.request(Method::POST, &url).json(&body), subject).await?;
        Ok(blob.sha)
    }
}

#[async_trait]
impl VcsBackend for GitHubBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self, path: &str, reference: &str) -> Result<VcsFile> {
        let url = self.contents_url(path)?;
        let request = self.request(Method::GET, &url).query(&[("ref", reference)]);
        let file = match self.send_json::<Contents>(request, path).await? {
            Contents::File(file) => file,
            Contents::Directory(_) => exn::bail!(ErrorKind::NotAFile(path.to_string())),
        };
        let content = if file.encoding == "base64" {
            decode_content(&file.content)?
        } else {
            self.blob(&file.sha).await?
        };
        Ok(VcsFile {
            path: file.path,
            content,
            sha: file.sha,
        })
    }

    async fn exists(&self, path: &str, reference: &str) -> Result<bool> {
        let url = self.contents_url(path)?;
        let request = self.request(Method::GET, &url).query(&[("ref", reference)]);
        match self.send(request, path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        branch: &str,
        sha: Option<&str>,
    ) -> Result<String> {
        let url = self.contents_url(path)?;
        let body = PutRequest {
            message,
            content: STANDARD.encode(content),
            branch,
            sha,
        };
        let response: PutResponse = self.send_json(self.request(Method::PUT, &url).json(&body), path).await?;
        tracing::debug!(backend = %self.name, path, branch, sha = %response.content.sha, "Committed file");
        Ok(response.content.sha)
    }

    async fn delete_file(&self, path: &str, message: &str, sha: &str, branch: &str) -> Result<()> {
        let url = self.contents_url(path)?;
        let body = DeleteRequest { message, sha, branch };
        self.send(self.request(Method::DELETE, &url).json(&body), path).await?;
        tracing::debug!(backend = %self.name, path, branch, "Deleted file");
        Ok(())
    }

    async fn get_ref(&self, branch: &str) -> Result<String> {
        let url = self.git_url(&format!("ref/heads/{}", utf8_percent_encode(branch, SEGMENT)));
        let reference: RefResponse = self.send_json(self.request(Method::GET, &url), branch).await?;
        Ok(reference.object.sha)
    }

    async fn commit_tree(&self, commit: &str) -> Result<String> {
        let url = self.git_url(&format!("commits/{commit}"));
        let commit: CommitResponse = self.send_json(self.request(Method::GET, &url), commit).await?;
        Ok(commit.tree.sha)
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let mut tree = Vec::with_capacity(entries.len());
        for entry in entries {
            let sha = match &entry.change {
                TreeChange::Upsert(content) => Some(self.create_blob(content, &entry.path).await?),
                TreeChange::Remove => None,
            };
            tree.push(TreeItem {
                path: &entry.path,
                mode: "100644",
                kind: "blob",
                sha,
            });
        }
        let body = TreeRequest { base_tree, tree };
        let url = self.git_url("trees");
        let created: Sha = self.send_json(self.request(Method::POST, &url).json(&body), base_tree).await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let body = CommitRequest { message, tree, parents };
        let url = self.git_url("commits");
        let created: Sha = self.send_json(self.request(Method::POST, &url).json(&body), tree).await?;
        Ok(created.sha)
    }

    async fn update_ref(&self, branch: &str, commit: &str) -> Result<()> {
        let url = self.git_url(&format!("refs/heads/{}", utf8_percent_encode(branch, SEGMENT)));
        let body = UpdateRefRequest { sha: commit, force: false };
        self.send(self.request(Method::PATCH, &url).json(&body), branch).await?;
        tracing::info!(backend = %self.name, branch, commit, "Advanced branch");
        Ok(())
    }
}
