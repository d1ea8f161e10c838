use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{
    decode_envelope, ApplicationInfo, EagleApi, EagleError, FolderRecord, FolderUpdate,
    ItemListQuery, ItemRecord,
};
use crate::config::AppConfig;

const APPLICATION_INFO: &str = "application/info";
const FOLDER_LIST: &str = "folder/list";
const FOLDER_UPDATE: &str = "folder/update";
const ITEM_LIST: &str = "item/list";
const ITEM_THUMBNAIL: &str = "item/thumbnail";

/// Blocking client for the Eagle local HTTP API.
#[derive(Debug, Clone)]
pub struct HttpEagleClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpEagleClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        let token = Some(token.trim().to_owned()).filter(|t| !t.is_empty());
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            &config.api_token,
            config.http.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.base_url, endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.query(&[("token", token.as_str())]),
            None => request,
        }
    }

    fn send(&self, endpoint: &'static str, request: RequestBuilder) -> Result<String, EagleError> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|err| EagleError::Transport {
                endpoint,
                source: Box::new(err),
            })?;
        let http_status = response.status();
        let body = response.text().map_err(|err| EagleError::Transport {
            endpoint,
            source: Box::new(err),
        })?;
        tracing::debug!(endpoint, %http_status, bytes = body.len(), "eagle api response");
        Ok(body)
    }

    fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, EagleError> {
        let request = self.http.get(self.endpoint_url(endpoint)).query(query);
        let body = self.send(endpoint, request)?;
        decode_envelope::<T>(endpoint, &body)?.into_data(endpoint)
    }
}

impl EagleApi for HttpEagleClient {
    fn application_info(&self) -> Result<ApplicationInfo, EagleError> {
        self.get(APPLICATION_INFO, &[])
    }

    fn folder_list(&self) -> Result<Vec<FolderRecord>, EagleError> {
        self.get(FOLDER_LIST, &[])
    }

    fn item_list(&self, query: &ItemListQuery) -> Result<Vec<ItemRecord>, EagleError> {
        let params = [
            ("limit", query.limit.to_string()),
            ("folders", query.folders.join(",")),
        ];
        self.get(ITEM_LIST, &params)
    }

    fn item_thumbnail(&self, item_id: &str) -> Result<PathBuf, EagleError> {
        let path: String = self.get(ITEM_THUMBNAIL, &[("id", item_id.to_owned())])?;
        Ok(PathBuf::from(path))
    }

    fn update_folder(&self, update: &FolderUpdate) -> Result<(), EagleError> {
        let request = self.http.post(self.endpoint_url(FOLDER_UPDATE)).json(update);
        let body = self.send(FOLDER_UPDATE, request)?;
        decode_envelope::<serde_json::Value>(FOLDER_UPDATE, &body)?.check_status(FOLDER_UPDATE)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use assert_matches::assert_matches;

    use super::*;

    /// Serves one canned JSON response and hands back the request head it received.
    fn serve_once(body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                head.push_str(&line);
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).expect("read body");
            head.push_str(&String::from_utf8_lossy(&payload));
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .expect("write response");
            head
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn item_list_sends_folder_filter_limit_and_token() {
        let (base, server) = serve_once(r#"{"status":"success","data":[{"id":"LRJ5T2ZD6TWUY","name":"a"}]}"#);
        let client = HttpEagleClient::new(&base, "secret", Duration::from_secs(5)).expect("client");
        let items = client
            .item_list(&ItemListQuery::for_folders(&["A1B2C3D4E5F6G".into()]))
            .expect("items");
        assert_eq!(items.len(), 1);
        let head = server.join().expect("server thread");
        let request_line = head.lines().next().unwrap_or_default().to_string();
        assert!(request_line.starts_with("GET /api/item/list?"));
        assert!(request_line.contains("limit=300"));
        assert!(request_line.contains("folders=A1B2C3D4E5F6G"));
        assert!(request_line.contains("token=secret"));
    }

    #[test]
    fn update_folder_posts_description() {
        let (base, server) = serve_once(r#"{"status":"success","data":{"id":"A1B2C3D4E5F6G"}}"#);
        let client = HttpEagleClient::new(&base, "", Duration::from_secs(5)).expect("client");
        client
            .update_folder(&FolderUpdate {
                folder_id: "A1B2C3D4E5F6G".into(),
                new_description: "sky, sea".into(),
            })
            .expect("update");
        let head = server.join().expect("server thread");
        assert!(head.starts_with("POST /api/folder/update"));
        assert!(!head.contains("token="));
        assert!(head.contains(r#""folderId":"A1B2C3D4E5F6G""#));
        assert!(head.contains(r#""newDescription":"sky, sea""#));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let client =
            HttpEagleClient::new(&format!("http://{addr}"), "", Duration::from_secs(2)).expect("client");
        assert_matches!(client.application_info(), Err(EagleError::Transport { .. }));
    }
}
