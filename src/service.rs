//! Log inspection service
//!
//! Composes the tail reader, search engine, remote command builder/executor
//! and byte cache behind one orchestration type consumed by the boundary
//! layer. Configuration is re-read per call so timeout and cache limit
//! changes apply immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logreach_logs::{search, tail, SearchOutcome};
use logreach_remote::{
    build_cat, build_list, classify, name_extensions_for, ByteCache, CacheKey, RemoteExec,
    COMMAND_LINE_CEILING,
};
use logreach_types::{
    FilterChain, InspectError, ListKind, PathType, Protocol, RemoteError, RemoteTarget,
    SearchOptions,
};

use crate::config::ConfigFile;

/// Remote bytes plus the MIME type guessed from the path
#[derive(Clone, Debug)]
pub struct FetchedBytes {
    pub data: Arc<Vec<u8>>,
    pub content_type: String,
    pub cached: bool,
}

/// Orchestrates local and remote log inspection operations.
///
/// Holds the only shared mutable state (the byte cache) and a boxed
/// execution seam so tests can substitute the SSH layer.
pub struct LogInspectionService {
    config: ConfigFile,
    executor: Arc<dyn RemoteExec>,
    cache: ByteCache,
}

impl LogInspectionService {
    pub fn new(config: ConfigFile, executor: Arc<dyn RemoteExec>) -> Self {
        Self {
            config,
            executor,
            cache: ByteCache::default(),
        }
    }

    /// Last `lines` lines of the registered log `name`
    pub async fn tail_local(&self, name: &str, lines: usize) -> Result<Vec<String>, InspectError> {
        let source = self.log_source(name)?;
        let result = tokio::task::spawn_blocking(move || tail(&source, lines))
            .await
            .map_err(join_io_error)??;
        info!(name, lines = result.len(), "tail served");
        Ok(result)
    }

    /// Streaming search over the registered log `name`
    pub async fn search_local(
        &self,
        name: &str,
        query: &str,
        options: SearchOptions,
        cancel: CancellationToken,
    ) -> Result<SearchOutcome, InspectError> {
        let source = self.log_source(name)?;
        let query = query.to_string();
        let outcome =
            tokio::task::spawn_blocking(move || search(&source, &query, &options, &cancel))
                .await
                .map_err(join_io_error)??;
        info!(
            name,
            results = outcome.matches.len(),
            truncated = outcome.truncated,
            "search served"
        );
        Ok(outcome)
    }

    /// Tail a remote pattern through the filter chain, returning capped lines
    pub async fn remote_cat(
        &self,
        profile_id: u64,
        pattern: &str,
        filters: &FilterChain,
        max_lines: usize,
    ) -> Result<Vec<String>, InspectError> {
        let config = self.config.snapshot().map_err(config_error)?;
        let target = ssh_profile(&config, profile_id)?;

        // Registered paths may embed a grep pipeline; its stages run ahead
        // of the caller's explicit filters
        let (pattern, mut chain) = FilterChain::split_registered(pattern);
        if pattern.is_empty() {
            return Err(InspectError::InvalidInput("pattern is required".into()));
        }
        chain.extend(filters);

        let command = build_cat(&pattern, &chain, max_lines);
        let output = self.execute(target, command, config.ssh_timeout()).await?;
        if !output.ok() {
            warn!(profile_id, exit_code = output.exit_code, "remote cat failed");
            return Err(RemoteError::new(pick_error(&output.stderr, output.exit_code)).into());
        }

        let lines: Vec<String> = output
            .stdout
            .lines()
            .take(COMMAND_LINE_CEILING)
            .map(str::to_string)
            .collect();
        info!(profile_id, %pattern, lines = lines.len(), "remote cat served");
        Ok(lines)
    }

    /// List remote files matching a glob, filtered by kind
    pub async fn remote_list(
        &self,
        profile_id: u64,
        pattern: &str,
        kind: ListKind,
        limit: usize,
    ) -> Result<Vec<String>, InspectError> {
        let config = self.config.snapshot().map_err(config_error)?;
        let target = ssh_profile(&config, profile_id)?;
        let pattern = sanitize_pattern(pattern)?;

        // Auto resolves exactly once, here at the boundary
        let kind = match kind {
            ListKind::Auto => classify(&pattern),
            ListKind::Text => PathType::Text,
            ListKind::Image => PathType::Image,
        };

        let limit = limit.clamp(1, COMMAND_LINE_CEILING);
        let command = build_list(&pattern, limit);
        let output = self.execute(target, command, config.ssh_timeout()).await?;
        if !output.ok() {
            warn!(profile_id, exit_code = output.exit_code, "remote list failed");
            return Err(RemoteError::new(pick_error(&output.stderr, output.exit_code)).into());
        }

        let extensions = name_extensions_for(kind);
        let files: Vec<String> = output
            .stdout
            .lines()
            .filter(|name| extensions.matches(name))
            .take(limit)
            .map(str::to_string)
            .collect();
        info!(profile_id, %pattern, ?kind, files = files.len(), "remote list served");
        Ok(files)
    }

    /// Fetch remote file bytes, consulting and populating the byte cache
    pub async fn remote_fetch(
        &self,
        profile_id: u64,
        path: &str,
    ) -> Result<FetchedBytes, InspectError> {
        let config = self.config.snapshot().map_err(config_error)?;
        let target = ssh_profile(&config, profile_id)?;
        let path = sanitize_pattern(path)?;
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        // Limits are hot-reloaded before every cache touch
        self.cache.configure(config.cache_ttl(), config.cache.max_bytes);

        let key = CacheKey::new(profile_id, path.clone());
        if let Some(data) = self.cache.get(&key) {
            info!(profile_id, %path, bytes = data.len(), "fetch served from cache");
            return Ok(FetchedBytes {
                data,
                content_type,
                cached: true,
            });
        }

        let executor = Arc::clone(&self.executor);
        let timeout = config.ssh_timeout();
        let max_payload = config.max_payload_bytes;
        let fetch_path = path.clone();
        let data = tokio::task::spawn_blocking(move || {
            executor.read_file(&target, &fetch_path, max_payload, timeout)
        })
        .await
        .map_err(join_remote_error)??;

        let data = Arc::new(data);
        if !data.is_empty() {
            self.cache.put(key, Arc::clone(&data));
        }
        info!(profile_id, %path, bytes = data.len(), "fetch served remotely");
        Ok(FetchedBytes {
            data,
            content_type,
            cached: false,
        })
    }

    /// Connectivity probe against an SSH profile
    pub async fn ping(&self, profile_id: u64) -> Result<(), InspectError> {
        let config = self.config.snapshot().map_err(config_error)?;
        let target = ssh_profile(&config, profile_id)?;
        let executor = Arc::clone(&self.executor);
        let timeout = config.ssh_timeout();
        tokio::task::spawn_blocking(move || executor.ping(&target, timeout))
            .await
            .map_err(join_remote_error)??;
        info!(profile_id, "ping ok");
        Ok(())
    }

    /// Registered logs from the current config snapshot
    pub fn list_logs(&self) -> Result<Vec<logreach_types::LogSource>, InspectError> {
        Ok(self.config.snapshot().map_err(config_error)?.logs)
    }

    fn log_source(&self, name: &str) -> Result<String, InspectError> {
        let config = self.config.snapshot().map_err(config_error)?;
        config
            .log_by_name(name)
            .map(|l| l.path.clone())
            .ok_or_else(|| InspectError::NotFound(format!("log '{name}'")))
    }

    async fn execute(
        &self,
        target: RemoteTarget,
        command: String,
        timeout: Duration,
    ) -> Result<logreach_remote::ExecOutput, InspectError> {
        let executor = Arc::clone(&self.executor);
        let output =
            tokio::task::spawn_blocking(move || executor.execute(&target, &command, timeout))
                .await
                .map_err(join_remote_error)??;
        Ok(output)
    }
}

/// Drop anything after a pipeline separator and require a non-empty pattern
fn sanitize_pattern(raw: &str) -> Result<String, InspectError> {
    let base = raw.split('|').next().unwrap_or("").trim();
    if base.is_empty() {
        return Err(InspectError::InvalidInput("pattern is required".into()));
    }
    Ok(base.to_string())
}

fn ssh_profile(
    config: &crate::config::Config,
    profile_id: u64,
) -> Result<RemoteTarget, InspectError> {
    let target = config
        .profile_by_id(profile_id)
        .ok_or_else(|| InspectError::NotFound(format!("profile {profile_id}")))?;
    if target.protocol != Protocol::Ssh {
        return Err(InspectError::InvalidInput(format!(
            "profile {profile_id} is not SSH"
        )));
    }
    Ok(target.clone())
}

fn pick_error(stderr: &str, exit_code: i32) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("remote command exited with code {exit_code}")
    } else {
        trimmed.to_string()
    }
}

fn config_error(err: anyhow::Error) -> InspectError {
    InspectError::InvalidInput(format!("configuration unavailable: {err:#}"))
}

fn join_io_error(err: tokio::task::JoinError) -> InspectError {
    InspectError::Io(std::io::Error::other(format!("blocking task failed: {err}")))
}

fn join_remote_error(err: tokio::task::JoinError) -> InspectError {
    RemoteError::new(format!("remote task failed: {err}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logreach_remote::ExecOutput;
    use parking_lot::Mutex;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    /// Scripted executor standing in for the SSH layer
    struct StubExec {
        commands: Mutex<Vec<String>>,
        exec_result: Mutex<Option<Result<ExecOutput, RemoteError>>>,
        file_bytes: Mutex<Option<Vec<u8>>>,
        fetches: Mutex<usize>,
    }

    impl StubExec {
        fn new() -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                exec_result: Mutex::new(None),
                file_bytes: Mutex::new(None),
                fetches: Mutex::new(0),
            }
        }

        fn respond(&self, stdout: &str) {
            *self.exec_result.lock() = Some(Ok(ExecOutput {
                exit_code: 0,
                stdout: stdout.to_string(),
                stderr: String::new(),
            }));
        }

        fn fail(&self, exit_code: i32, stderr: &str) {
            *self.exec_result.lock() = Some(Ok(ExecOutput {
                exit_code,
                stdout: String::new(),
                stderr: stderr.to_string(),
            }));
        }

        fn serve_file(&self, bytes: &[u8]) {
            *self.file_bytes.lock() = Some(bytes.to_vec());
        }
    }

    impl RemoteExec for StubExec {
        fn execute(
            &self,
            _target: &RemoteTarget,
            command: &str,
            _timeout: Duration,
        ) -> Result<ExecOutput, RemoteError> {
            self.commands.lock().push(command.to_string());
            self.exec_result
                .lock()
                .take()
                .unwrap_or_else(|| Err(RemoteError::new("no scripted response")))
        }

        fn read_file(
            &self,
            _target: &RemoteTarget,
            _path: &str,
            max_bytes: u64,
            _timeout: Duration,
        ) -> Result<Vec<u8>, InspectError> {
            *self.fetches.lock() += 1;
            let bytes = self
                .file_bytes
                .lock()
                .clone()
                .ok_or_else(|| RemoteError::new("no scripted file"))?;
            if bytes.len() as u64 > max_bytes {
                return Err(InspectError::PayloadTooLarge {
                    size: bytes.len() as u64,
                    limit: max_bytes,
                });
            }
            Ok(bytes)
        }
    }

    struct Fixture {
        service: LogInspectionService,
        stub: Arc<StubExec>,
        _dir: TempDir,
    }

    fn fixture(config_body: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("logreach.toml");
        std::fs::write(&config_path, config_body).unwrap();
        let stub = Arc::new(StubExec::new());
        let service =
            LogInspectionService::new(ConfigFile::new(&config_path), stub.clone());
        Fixture {
            service,
            stub,
            _dir: dir,
        }
    }

    fn ssh_profile_config() -> String {
        r#"
[[profiles]]
id = 1
protocol = "ssh"
host = "db01"
port = 22
username = "ops"
password = "secret"

[[profiles]]
id = 2
protocol = "ftp"
host = "files01"
port = 21
"#
        .to_string()
    }

    #[tokio::test]
    async fn tail_unknown_log_is_not_found() {
        let fx = fixture("");
        let err = fx.service.tail_local("nope", 10).await.unwrap_err();
        assert!(matches!(err, InspectError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_end_to_end_scenario() {
        let mut log = NamedTempFile::new().unwrap();
        for line in ["a", "b", "ERROR x", "c", "ERROR y"] {
            writeln!(log, "{line}").unwrap();
        }
        log.flush().unwrap();
        let config = format!(
            "[[logs]]\nname = \"app\"\npath = {:?}\n",
            log.path().to_str().unwrap()
        );
        let fx = fixture(&config);

        let outcome = fx
            .service
            .search_local(
                "app",
                "ERROR",
                SearchOptions {
                    context_lines: 1,
                    limit: 10,
                    ..SearchOptions::default()
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!outcome.truncated);
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.matches[0].line, 3);
        assert_eq!(outcome.matches[0].context_before, ["b"]);
        assert_eq!(outcome.matches[1].line, 5);
        assert_eq!(outcome.matches[1].context_before, ["c"]);
    }

    #[tokio::test]
    async fn cat_builds_capped_filtered_command() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.respond("line 1\nline 2\n");
        let chain = FilterChain::from_stages(["ERROR"]);
        let lines = fx
            .service
            .remote_cat(1, "/var/log/app*.log", &chain, 200)
            .await
            .unwrap();
        assert_eq!(lines, ["line 1", "line 2"]);

        let commands = fx.stub.commands.lock();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("tail -n 200 -- /var/log/app*.log"));
        assert!(commands[0].contains("grep -F -- '\"'\"'ERROR'\"'\"'"));
    }

    #[tokio::test]
    async fn cat_merges_registered_pipeline_before_explicit_filters() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.respond("ok\n");
        let chain = FilterChain::from_stages(["ERROR"]);
        fx.service
            .remote_cat(1, "/var/log/app*.log | grep warn | rm -rf /", &chain, 50)
            .await
            .unwrap();

        let commands = fx.stub.commands.lock();
        let command = &commands[0];
        assert!(command.contains("tail -n 50 -- /var/log/app*.log"));
        // Embedded grep stages run first, explicit filters after
        let warn_at = command.find("grep -F -- '\"'\"'warn'\"'\"'").unwrap();
        let error_at = command.find("grep -F -- '\"'\"'ERROR'\"'\"'").unwrap();
        assert!(warn_at < error_at);
        // Non-grep pipeline segments never reach the remote shell
        assert!(!command.contains("rm -rf"));
    }

    #[tokio::test]
    async fn cat_surfaces_remote_failure() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.fail(2, "tail: cannot open");
        let err = fx
            .service
            .remote_cat(1, "/var/log/x.log", &FilterChain::new(), 10)
            .await
            .unwrap_err();
        match err {
            InspectError::Remote(remote) => assert!(remote.message.contains("cannot open")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cat_rejects_non_ssh_profile_and_empty_pattern() {
        let fx = fixture(&ssh_profile_config());
        let err = fx
            .service
            .remote_cat(2, "/x.log", &FilterChain::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidInput(_)));

        let err = fx
            .service
            .remote_cat(1, "   | grep x", &FilterChain::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, InspectError::InvalidInput(_)));

        let err = fx
            .service
            .remote_cat(99, "/x.log", &FilterChain::new(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, InspectError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_auto_kind_filters_image_names() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.respond("/srv/a.png\n/srv/b.log\n/srv/c.JPG\n");
        let files = fx
            .service
            .remote_list(1, "/srv/*.png", ListKind::Auto, 100)
            .await
            .unwrap();
        assert_eq!(files, ["/srv/a.png", "/srv/c.JPG"]);
    }

    #[tokio::test]
    async fn fetch_hits_cache_on_second_call() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.serve_file(b"\x89PNG...");

        let first = fx.service.remote_fetch(1, "/srv/shot.png").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.content_type, "image/png");

        let second = fx.service.remote_fetch(1, "/srv/shot.png").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.data, first.data);
        assert_eq!(*fx.stub.fetches.lock(), 1);
    }

    #[tokio::test]
    async fn fetch_oversized_payload_is_rejected_and_not_cached() {
        let config = format!("max_payload_bytes = 4\n{}", ssh_profile_config());
        let fx = fixture(&config);
        fx.stub.serve_file(b"way more than four bytes");

        let err = fx.service.remote_fetch(1, "/srv/big.bin").await.unwrap_err();
        assert!(matches!(err, InspectError::PayloadTooLarge { .. }));

        // A retry goes remote again: nothing was cached
        fx.stub.serve_file(b"big");
        let ok = fx.service.remote_fetch(1, "/srv/big.bin").await.unwrap();
        assert!(!ok.cached);
        assert_eq!(*fx.stub.fetches.lock(), 2);
    }

    #[tokio::test]
    async fn ping_runs_noop_command() {
        let fx = fixture(&ssh_profile_config());
        fx.stub.respond("");
        fx.service.ping(1).await.unwrap();
        assert_eq!(fx.stub.commands.lock()[0], "bash -lc 'true'");
    }
}
