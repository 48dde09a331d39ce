// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebDAV backend. Listing is a `PROPFIND` request with a `Depth` header;
//! the response is a `multistatus` XML document parsed incrementally with
//! `quick-xml` rather than deserialized into a full DOM. Auth is HTTP Basic.

use super::{
    BuildStrmRequest, Driver, DriverEvent, DriverEventKind, DriverKind, ListOptions, WatchOptions,
};
use async_trait::async_trait;
use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use strmsync_core::{CompareOutcome, DriverCapabilities, RemoteEntry, StrmInfo, TaskError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone)]
struct DavEntry {
    href: String,
    size: u64,
    mod_time: i64,
    is_dir: bool,
}

pub struct WebDavDriver {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl WebDavDriver {
    pub fn new(host: String, port: u16, credentials: String) -> Self {
        let (username, password) = credentials
            .split_once(':')
            .map(|(u, p)| (u.to_string(), p.to_string()))
            .unwrap_or((credentials, String::new()));
        Self {
            base_url: format!("http://{host}:{port}"),
            username,
            password,
            client: reqwest::Client::new(),
        }
    }

    async fn propfind(&self, path: &str, depth: &str) -> Result<Vec<DavEntry>, TaskError> {
        let url = format!("{}{}", self.base_url, normalize(path));
        let resp = self
            .client
            .request(reqwest::Method::from_bytes(b"PROPFIND").expect("static method"), &url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Depth", depth)
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(TaskError::input_invalid(format!("no such path: {path}")));
        }
        if !resp.status().is_success() && resp.status().as_u16() != 207 {
            return Err(TaskError::network(format!(
                "PROPFIND failed with status {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        parse_multistatus(&body)
    }
}

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:getcontentlength/>
    <D:getlastmodified/>
  </D:prop>
</D:propfind>"#;

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Parse a WebDAV `multistatus` response into one [`DavEntry`] per `response`
/// element. Deliberately tolerant: an element this driver doesn't recognize is
/// skipped rather than treated as a parse error, since servers vary widely in
/// which extra `DAV:` properties they emit.
fn parse_multistatus(body: &str) -> Result<Vec<DavEntry>, TaskError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut current = DavEntry::default();
    let mut in_response = false;
    let mut text_target: Option<&'static str> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) | Ok(XmlEvent::Empty(e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "response" => {
                        in_response = true;
                        current = DavEntry::default();
                    }
                    "href" if in_response => text_target = Some("href"),
                    "collection" if in_response => current.is_dir = true,
                    "getcontentlength" if in_response => text_target = Some("size"),
                    "getlastmodified" if in_response => text_target = Some("mtime"),
                    _ => {}
                }
            }
            Ok(XmlEvent::Text(t)) => {
                if let Some(target) = text_target {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    match target {
                        "href" => current.href = text,
                        "size" => current.size = text.trim().parse().unwrap_or(0),
                        "mtime" => current.mod_time = parse_http_date(&text),
                        _ => {}
                    }
                }
            }
            Ok(XmlEvent::End(e)) => {
                let local = local_name(e.name().as_ref());
                match local.as_str() {
                    "response" => {
                        in_response = false;
                        out.push(current.clone());
                    }
                    "href" | "getcontentlength" | "getlastmodified" => text_target = None,
                    _ => {}
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(TaskError::network(format!("malformed PROPFIND response: {e}"))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    s.rsplit_once(':').map(|(_, n)| n).unwrap_or(&s).to_lowercase()
}

/// Best-effort RFC 1123 date parse; returns 0 (unknown) rather than failing
/// the whole listing on a server that formats dates unusually.
fn parse_http_date(s: &str) -> i64 {
    httpdate::parse_http_date(s)
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Minimal RFC 1123 parser so this module doesn't need its own date crate;
/// `PROPFIND`'s `getlastmodified` is always this format per RFC 4918 §15.7.
mod httpdate {
    use std::time::{Duration, SystemTime};

    pub fn parse_http_date(s: &str) -> Result<SystemTime, ()> {
        // "Mon, 02 Jan 2006 15:04:05 GMT"
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() != 6 {
            return Err(());
        }
        let day: u64 = parts[1].parse().map_err(|_| ())?;
        let month = month_index(parts[2]).ok_or(())?;
        let year: u64 = parts[3].parse().map_err(|_| ())?;
        let mut time_parts = parts[4].split(':');
        let hour: u64 = time_parts.next().ok_or(())?.parse().map_err(|_| ())?;
        let min: u64 = time_parts.next().ok_or(())?.parse().map_err(|_| ())?;
        let sec: u64 = time_parts.next().ok_or(())?.parse().map_err(|_| ())?;

        let days_since_epoch = days_from_civil(year as i64, month, day as i64);
        if days_since_epoch < 0 {
            return Err(());
        }
        let secs = days_since_epoch as u64 * 86_400 + hour * 3_600 + min * 60 + sec;
        Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn month_index(name: &str) -> Option<u64> {
        const MONTHS: [&str; 12] = [
            "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
        ];
        MONTHS.iter().position(|m| *m == name).map(|i| i as u64 + 1)
    }

    /// Howard Hinnant's days-from-civil algorithm (proleptic Gregorian, epoch = 1970-01-01).
    fn days_from_civil(y: i64, m: u64, d: i64) -> i64 {
        let y = if m <= 2 { y - 1 } else { y };
        let era = if y >= 0 { y } else { y - 399 } / 400;
        let yoe = (y - era * 400) as i64;
        let mp = ((m as i64 + 9) % 12) as i64;
        let doy = (153 * mp + 2) / 5 + d - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        era * 146_097 + doe - 719_468
    }
}

#[async_trait]
impl Driver for WebDavDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::WebDav
    }

    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            watch: false,
            strm_http: true,
            strm_mount: false,
            pick_code: false,
            sign_url: false,
        }
    }

    async fn list(
        &self,
        path: &str,
        opts: ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteEntry>, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let depth = if opts.recursive { "infinity" } else { "1" };
        let entries = self.propfind(path, depth).await?;
        let root = normalize(path);
        Ok(entries
            .into_iter()
            .filter(|e| e.href.trim_end_matches('/') != root.trim_end_matches('/'))
            .map(|e| {
                let href = e.href.trim_end_matches('/');
                let name = href.rsplit('/').next().unwrap_or(href).to_string();
                RemoteEntry {
                    path: e.href.clone(),
                    name,
                    size: e.size,
                    mod_time: e.mod_time,
                    is_dir: e.is_dir,
                }
            })
            .collect())
    }

    async fn stat(&self, path: &str, cancel: &CancellationToken) -> Result<RemoteEntry, TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let entries = self.propfind(path, "0").await?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| TaskError::input_invalid(format!("no such path: {path}")))?;
        let name = entry
            .href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Ok(RemoteEntry {
            path: path.to_string(),
            name,
            size: entry.size,
            mod_time: entry.mod_time,
            is_dir: entry.is_dir,
        })
    }

    fn build_strm_info(&self, req: BuildStrmRequest) -> StrmInfo {
        let path = normalize(&req.remote_path);
        StrmInfo {
            raw: format!("{}{}", self.base_url, path),
            base_url: self.base_url.clone(),
            path,
            pick_code: None,
            sign: None,
            expires_at: 0,
        }
    }

    fn compare_strm(&self, expected: &StrmInfo, actual_raw: &str, now_ms: i64) -> CompareOutcome {
        strmsync_core::compare_strm(expected, actual_raw, now_ms, self.capabilities())
    }

    async fn watch(
        &self,
        _path: &str,
        _opts: WatchOptions,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<DriverEvent>, TaskError> {
        Err(TaskError::unsupported(
            "webdav does not expose a watch capability",
        ))
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        self.propfind("/", "0").await.map(|_| ())
    }

    async fn copy(
        &self,
        _local_source_path: &str,
        _target_path: &str,
        _cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        Err(TaskError::unsupported(
            "webdav exposes no local mount to copy from",
        ))
    }

    async fn download(
        &self,
        remote_path: &str,
        target_path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TaskError> {
        if cancel.is_cancelled() {
            return Err(TaskError::cancelled());
        }
        let url = format!("{}{}", self.base_url, normalize(remote_path));
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaskError::network(format!(
                "GET failed with status {}",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TaskError::network(e.to_string()))?;
        if let Some(parent) = std::path::Path::new(target_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::io(e.to_string()))?;
        }
        tokio::fs::write(target_path, &bytes)
            .await
            .map_err(|e| TaskError::io(e.to_string()))
    }
}

#[cfg(test)]
#[path = "webdav_tests.rs"]
mod tests;
