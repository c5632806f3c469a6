pub mod api;
pub mod bridge;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod form;
pub mod render;
pub mod reorder;
pub mod session;
pub mod store;
pub mod task;
pub mod theme;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tareas CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.tareasrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  if let Some(url) = cli.api_url {
    cfg.set("api.url", &url);
  }
  let settings = cfg
    .settings(cli.data.as_deref())
    .context("invalid configuration")?;
  debug!(?settings, sources = ?cfg.sources, "resolved settings");

  let kv = datastore::FileKv::open(
    &settings.data_dir
  )
  .with_context(|| {
    format!(
      "failed to open local storage \
       at {}",
      settings.data_dir.display()
    )
  })?;
  let bridge =
    bridge::PersistenceBridge::new(kv);

  let mut renderer =
    render::Renderer::new(
      settings.color,
      theme::load_theme(&bridge)
    );

  let api = api::HttpTaskApi::new(
    &settings.api_url,
    settings.api_timeout
  )?;
  info!(base = api.base_url(), "task API configured");

  let command = cli
    .command
    .unwrap_or(cli::Command::List {
      category: filter::Category::All,
      search:   None
    });

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;
  runtime.block_on(commands::dispatch(
    api,
    bridge,
    &mut renderer,
    command
  ))?;

  info!("done");
  Ok(())
}
