//! Beatstore Player - headless front end for the beat catalog
//!
//! ## Commands
//!
//! - `catalog`: list beats with their tier prices
//! - `snippet <url> <out.wav>`: derive a preview snippet and write it to disk
//! - `download <beat-id> <mp3|wav|stems>`: save a purchased file into the
//!   configured download directory
//! - `preview [--limit N] [--listen SECS]`: step through the catalog playing
//!   snippets on a wall-clock transport
//!
//! Configuration is read from `~/.config/beatstore/config.yaml`
//! (`--config <path>` overrides it). Set `RUST_LOG=debug` for verbose output.

mod clock;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};

use beatstore_core::catalog::CatalogClient;
use beatstore_core::config::{default_config_path, load_config, StoreConfig};
use beatstore_core::playback::{PlaybackCoordinator, ProgressTicker};
use beatstore_core::snippet::{AudioFetcher, HandleStore, SnippetCache, SnippetDeriver, SourceFetcher};
use beatstore_core::waveform::{ProgressRenderer, WaveformRenderer};
use beatstore_core::{Beat, BeatId, Tier};

use clock::ClockTransport;

const USAGE: &str = "usage: beatstore-player [--config <path>] <catalog | snippet <url> <out.wav> | download <beat-id> <tier> | preview [--limit N] [--listen SECS]>";

/// Default number of beats `preview` steps through
const DEFAULT_PREVIEW_LIMIT: usize = 3;

/// Default seconds `preview` listens to each beat
const DEFAULT_LISTEN_SECS: f64 = 5.0;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = take_option(&mut args, "--config")?
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config: StoreConfig = load_config(&config_path);
    log::info!("beatstore-player starting up (config: {:?})", config_path);

    match args.first().map(String::as_str) {
        Some("catalog") => list_catalog(&config),
        Some("snippet") => match (args.get(1), args.get(2)) {
            (Some(url), Some(out)) => write_snippet(&config, url, Path::new(out)),
            _ => bail!("{USAGE}"),
        },
        Some("download") => match (args.get(1), args.get(2)) {
            (Some(id), Some(tier)) => {
                let id: i64 = id.parse().context("beat id must be a number")?;
                let Some(tier) = Tier::parse(tier) else {
                    bail!("unknown tier {tier:?} (expected mp3, wav or stems)");
                };
                download(&config, BeatId(id), tier)
            }
            _ => bail!("{USAGE}"),
        },
        Some("preview") => {
            let limit = take_option(&mut args, "--limit")?
                .map(|v| v.parse::<usize>().context("--limit expects a number"))
                .transpose()?
                .unwrap_or(DEFAULT_PREVIEW_LIMIT);
            let listen = take_option(&mut args, "--listen")?
                .map(|v| v.parse::<f64>().context("--listen expects seconds"))
                .transpose()?
                .unwrap_or(DEFAULT_LISTEN_SECS);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(preview(&config, limit, Duration::from_secs_f64(listen.max(0.0))))
        }
        _ => bail!("{USAGE}"),
    }
}

/// Remove `--flag value` from the argument list and return the value
fn take_option(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|arg| arg == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{flag} needs a value");
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn list_catalog(config: &StoreConfig) -> anyhow::Result<()> {
    let client = CatalogClient::new(&config.api);
    let beats = client.beats().context("Failed to load catalog")?;

    for beat in &beats {
        let prices: Vec<String> = Tier::ALL
            .iter()
            .filter(|tier| beat.offers(**tier))
            .map(|tier| match beat.price_for(*tier) {
                Some(price) => format!("{} ${:.2}", tier.label(), price),
                None => tier.label().to_string(),
            })
            .collect();
        println!("{:>5}  {}  [{}]", beat.id.0, beat.summary(), prices.join(", "));
    }
    println!("{} beat(s)", beats.len());
    Ok(())
}

fn write_snippet(config: &StoreConfig, url: &str, out: &Path) -> anyhow::Result<()> {
    let fetcher = Arc::new(SourceFetcher::new(config.api.timeout()));
    let deriver = SnippetDeriver::new(fetcher, Arc::new(HandleStore::new()))
        .with_snippet_seconds(config.preview.snippet_seconds());

    let asset = deriver
        .render(url)
        .with_context(|| format!("No snippet could be derived from {url}"))?;
    std::fs::write(out, &asset.bytes).with_context(|| format!("Failed to write {:?}", out))?;

    println!(
        "{:?}: {:.2}s, {} ch @ {} Hz",
        out,
        asset.duration_secs(),
        asset.channels,
        asset.sample_rate
    );
    Ok(())
}

fn download(config: &StoreConfig, id: BeatId, tier: Tier) -> anyhow::Result<()> {
    let client = CatalogClient::new(&config.api);
    if !client.is_signed_in() {
        bail!("Downloads need api.token in {:?}", default_config_path());
    }

    let beats = client.beats().context("Failed to load catalog")?;
    let beat = beats
        .iter()
        .find(|beat| beat.id == id)
        .with_context(|| format!("No beat with id {id}"))?;
    if !client.check_purchase(id, tier)? {
        bail!("{} license for {} has not been purchased", tier.label(), beat.name);
    }

    let path = client
        .download_to(beat, tier, &config.download_dir)
        .with_context(|| format!("Failed to download {}", beat.name))?;
    println!("Saved {:?}", path);
    Ok(())
}

async fn preview(config: &StoreConfig, limit: usize, listen: Duration) -> anyhow::Result<()> {
    let client = CatalogClient::new(&config.api);
    let beats = tokio::task::spawn_blocking(move || client.beats())
        .await
        .context("Catalog task failed")?
        .context("Failed to load catalog")?;

    let (mut playable, silent): (Vec<_>, Vec<_>) =
        beats.into_iter().partition(|beat| beat.preview_source().is_some());
    for beat in &silent {
        log::info!("preview: Skipping {}, no audio to preview", beat.summary());
    }
    if playable.is_empty() {
        println!("Nothing playable in the catalog");
        return Ok(());
    }

    let fetcher: Arc<dyn AudioFetcher> = Arc::new(SourceFetcher::new(config.api.timeout()));
    let handles = Arc::new(HandleStore::new());
    let deriver = SnippetDeriver::new(fetcher.clone(), handles.clone())
        .with_snippet_seconds(config.preview.snippet_seconds());
    let cache = Arc::new(SnippetCache::new(Arc::new(deriver)));

    let (transport, clock) = ClockTransport::new(handles, fetcher);
    let (event_tx, event_rx) = crossbeam::channel::unbounded();
    let tick = config.preview.tick_interval();
    let _ticker = ProgressTicker::spawn(clock, tick, event_tx).context("Failed to start progress ticker")?;

    let mut coordinator = PlaybackCoordinator::new(cache, Box::new(transport))
        .with_fallback_to_full_asset(config.preview.fallback_to_full_asset);
    coordinator.set_playlist(playable.clone());
    coordinator.set_player_visible(true);

    let renderer = Arc::new(ProgressRenderer::new());
    let renderer_dyn: Arc<dyn WaveformRenderer> = renderer.clone();

    let mut played = 0;
    while played < limit && !playable.is_empty() {
        let target = next_index(&playable, coordinator.state().current_asset());
        if coordinator.state().current_asset() == Some(playable[target].id) {
            log::debug!("preview: Only the current beat is left");
            break;
        }

        coordinator.next().await;
        if coordinator.state().current_asset() != Some(playable[target].id) {
            let dropped = playable.remove(target);
            log::warn!("preview: Could not load {}, skipping it", dropped.summary());
            coordinator.set_playlist(playable.clone());
            continue;
        }
        let (Some(beat), Some(url)) = (
            coordinator.current_beat().cloned(),
            coordinator.state().current_url().map(str::to_string),
        ) else {
            break;
        };
        played += 1;

        if !coordinator.state().is_playing() {
            coordinator.play();
        }
        coordinator.register_waveform(&url, beat.id, renderer_dyn.clone());
        println!("▶ {}", beat.summary());

        let deadline = Instant::now() + listen;
        while Instant::now() < deadline && coordinator.state().is_playing() {
            tokio::time::sleep(tick).await;
            coordinator.drain_events(&event_rx);

            let state = coordinator.state();
            print!(
                "\r  {} {:>6.2}/{:.2}s",
                renderer.bar(30),
                state.current_time(),
                state.duration()
            );
            let _ = std::io::stdout().flush();
        }
        println!();

        coordinator.pause();
        coordinator.unregister_waveform(&url, &renderer_dyn);
    }

    Ok(())
}

/// Playlist index `next` moves to from `current` (first entry when nothing
/// is current)
fn next_index(playlist: &[Beat], current: Option<BeatId>) -> usize {
    current
        .and_then(|id| playlist.iter().position(|beat| beat.id == id))
        .map_or(0, |i| (i + 1) % playlist.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(id: i64) -> Beat {
        Beat {
            id: BeatId(id),
            name: format!("beat {id}"),
            genre: "trap".to_string(),
            bpm: 140,
            scale: "A minor".to_string(),
            cover_art: None,
            snippet_mp3: None,
            price: None,
            mp3_file: Some(format!("http://cdn/mp3/{id}.mp3")),
            mp3_price: None,
            wav_file: None,
            wav_price: None,
            stems_file: None,
            stems_price: None,
        }
    }

    #[test]
    fn test_next_index_wraps_and_starts_at_first() {
        let playlist = vec![beat(1), beat(2), beat(3)];
        assert_eq!(next_index(&playlist, None), 0);
        assert_eq!(next_index(&playlist, Some(BeatId(1))), 1);
        assert_eq!(next_index(&playlist, Some(BeatId(3))), 0);
    }

    #[test]
    fn test_next_index_after_current_was_dropped() {
        // The current beat is gone from the playlist: start over
        let playlist = vec![beat(2), beat(3)];
        assert_eq!(next_index(&playlist, Some(BeatId(1))), 0);
    }

    #[test]
    fn test_take_option_removes_flag_and_value() {
        let mut args: Vec<String> = ["preview", "--limit", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(take_option(&mut args, "--limit").unwrap().as_deref(), Some("2"));
        assert_eq!(args, vec!["preview".to_string()]);
        assert!(take_option(&mut vec!["--limit".to_string()], "--limit").is_err());
    }
}
