//! Rolling windows over a price series and rendering of sampled windows

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::{Candle, Frame, Group, Signal, FIRM, OHLC, TIME};
use crate::error::{Error, Result};
use crate::imaging::{CandlestickRenderer, ImageConfig, LineRenderer, PlotKind};
use crate::io::ensure_dir;

/// Lifecycle of one window during rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Pending,
    Flagged,
    Rendered,
    Skipped,
    Failed,
}

impl WindowState {
    /// Transition from `Pending` given the end row's sampled flag
    pub fn classify(self, flagged: bool) -> Self {
        match self {
            WindowState::Pending if flagged => WindowState::Flagged,
            WindowState::Pending => WindowState::Skipped,
            other => other,
        }
    }

    /// Transition from `Flagged` after rendering
    pub fn finish(self, ok: bool) -> Self {
        match self {
            WindowState::Flagged if ok => WindowState::Rendered,
            WindowState::Flagged => WindowState::Failed,
            other => other,
        }
    }
}

/// `window_size` consecutive rows of one firm
#[derive(Debug, Clone)]
pub struct Window<'a> {
    frame: &'a Frame,
    firm: String,
    rows: Vec<usize>,
}

impl<'a> Window<'a> {
    pub fn firm(&self) -> &str {
        &self.firm
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Frame row the window ends at
    pub fn end_row(&self) -> usize {
        self.rows[self.rows.len() - 1]
    }

    /// Timestamp of the last row
    pub fn end_time(&self, time_column: &str) -> Result<NaiveDateTime> {
        Ok(self.frame.times(time_column)?[self.end_row()])
    }

    /// Timestamps of the window rows
    pub fn times(&self, time_column: &str) -> Result<Vec<NaiveDateTime>> {
        let times = self.frame.times(time_column)?;
        Ok(self.rows.iter().map(|&r| times[r]).collect())
    }

    /// Numeric values of `column` over the window
    pub fn values(&self, column: &str) -> Result<Vec<f64>> {
        let column_ref = self.frame.column(column)?;
        self.rows
            .iter()
            .map(|&r| {
                column_ref.as_f64(r).ok_or_else(|| {
                    Error::InvalidColumn(format!("{} is {}, expected numeric", column, column_ref.dtype()))
                })
            })
            .collect()
    }

    /// OHLC candles over the window; fails if any OHLC column is missing
    pub fn candles(&self, time_column: &str) -> Result<Vec<Candle>> {
        let times = self.frame.times(time_column)?;
        let [open, high, low, close] = OHLC;
        let (open, high, low, close) = (
            self.frame.floats(open)?,
            self.frame.floats(high)?,
            self.frame.floats(low)?,
            self.frame.floats(close)?,
        );

        Ok(self
            .rows
            .iter()
            .map(|&r| Candle::new(times[r], open[r], high[r], low[r], close[r]))
            .collect())
    }
}

/// Lazy iterator over full windows, firm by firm
pub struct Windows<'a> {
    frame: &'a Frame,
    groups: Vec<Group>,
    size: usize,
    group: usize,
    start: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(group) = self.groups.get(self.group) {
            if self.start + self.size <= group.rows.len() {
                let window = Window {
                    frame: self.frame,
                    firm: group.key.clone(),
                    rows: group.rows[self.start..self.start + self.size].to_vec(),
                };
                self.start += 1;
                return Some(window);
            }
            self.group += 1;
            self.start = 0;
        }
        None
    }
}

/// What to draw for each sampled window
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Indicator name used in file names
    pub indicator: String,
    pub signal: Signal,
    /// Column plotted by line charts
    pub plot_var: String,
    pub kinds: Vec<PlotKind>,
}

/// One window that could not be rendered
#[derive(Debug, Clone, Serialize)]
pub struct RenderFailure {
    pub window: String,
    pub kind: PlotKind,
    pub reason: String,
}

/// Outcome of a rendering pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderReport {
    /// Files written, in iteration order
    pub rendered: Vec<PathBuf>,
    /// Windows whose end row was not sampled
    pub skipped: usize,
    /// Sampled rows without `window_size` rows of history
    pub incomplete: usize,
    /// Flagged windows with every plot kind written
    pub windows_rendered: usize,
    /// Flagged windows with at least one failed plot kind
    pub windows_failed: usize,
    /// Writes that replaced a file already written in this pass
    pub overwritten: usize,
    pub failures: Vec<RenderFailure>,
}

/// Renders every window whose end row carries the sampled flag
pub struct WindowRenderer {
    window_size: usize,
    out_dir: PathBuf,
    firm_column: String,
    time_column: String,
    line: LineRenderer,
    candle: CandlestickRenderer,
}

impl WindowRenderer {
    /// Create a renderer writing into `out_dir`
    pub fn new(window_size: usize, out_dir: impl Into<PathBuf>) -> Result<Self> {
        if window_size == 0 {
            return Err(Error::InvalidParameter("window size must be > 0".into()));
        }
        let config = ImageConfig::default();
        Ok(Self {
            window_size,
            out_dir: out_dir.into(),
            firm_column: FIRM.to_string(),
            time_column: TIME.to_string(),
            line: LineRenderer::with_config(config.clone()),
            candle: CandlestickRenderer::with_config(config),
        })
    }

    /// Set output image size
    pub fn image_size(mut self, width: u32, height: u32) -> Self {
        self.line = LineRenderer::new(width, height);
        self.candle = CandlestickRenderer::new(width, height);
        self
    }

    /// Set firm and time column names
    pub fn columns(mut self, firm: impl Into<String>, time: impl Into<String>) -> Self {
        self.firm_column = firm.into();
        self.time_column = time.into();
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// All full windows of `frame`, firm by firm
    pub fn windows<'a>(&self, frame: &'a Frame) -> Result<Windows<'a>> {
        Ok(Windows {
            frame,
            groups: frame.group_indices(&self.firm_column)?,
            size: self.window_size,
            group: 0,
            start: 0,
        })
    }

    /// `{dir}/{firm}_{indicator}_{signal}_{date}_{kind}.jpg`
    pub fn file_name(
        &self,
        firm: &str,
        indicator: &str,
        signal: Signal,
        end: NaiveDateTime,
        kind: PlotKind,
    ) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}_{}_{}_{}.jpg",
            firm,
            indicator,
            signal,
            end.format("%Y-%m-%d"),
            kind
        ))
    }

    /// Render every window whose end row is flagged in `sampled_column`.
    ///
    /// A missing flag or time column aborts; a failure inside one window is
    /// recorded and the pass continues.
    pub fn render_sampled(
        &self,
        frame: &Frame,
        sampled_column: &str,
        plan: &RenderPlan,
    ) -> Result<RenderReport> {
        let flags = frame.bools(sampled_column)?;
        frame.times(&self.time_column)?;
        ensure_dir(&self.out_dir)?;

        let mut report = RenderReport::default();
        let mut written: HashSet<PathBuf> = HashSet::new();

        for group in frame.group_indices(&self.firm_column)? {
            let short = self.window_size.saturating_sub(1).min(group.rows.len());
            let incomplete = group.rows[..short].iter().filter(|&&r| flags[r]).count();
            if incomplete > 0 {
                warn!(firm = %group.key, incomplete, "sampled rows without a full window");
                report.incomplete += incomplete;
            }
        }

        for window in self.windows(frame)? {
            let state = WindowState::Pending.classify(flags[window.end_row()]);
            if state == WindowState::Skipped {
                report.skipped += 1;
                continue;
            }

            let mut ok = true;
            for &kind in &plan.kinds {
                match self.render_window(&window, plan, kind) {
                    Ok(path) => {
                        debug!(path = %path.display(), "rendered window");
                        if written.insert(path.clone()) {
                            report.rendered.push(path);
                        } else {
                            // file names carry the date only
                            warn!(path = %path.display(), row = window.end_row(), "window overwrote an image from this pass");
                            report.overwritten += 1;
                        }
                    }
                    Err(err) => {
                        warn!(firm = %window.firm(), row = window.end_row(), %kind, error = %err, "window render failed");
                        ok = false;
                        report.failures.push(RenderFailure {
                            window: format!("{}@{}", window.firm(), window.end_row()),
                            kind,
                            reason: err.to_string(),
                        });
                    }
                }
            }
            match state.finish(ok) {
                WindowState::Rendered => report.windows_rendered += 1,
                WindowState::Failed => report.windows_failed += 1,
                other => debug!(state = ?other, "window left unfinished"),
            }
        }

        info!(
            rendered = report.rendered.len(),
            skipped = report.skipped,
            failed = report.windows_failed,
            overwritten = report.overwritten,
            dir = %self.out_dir.display(),
            "rendering finished"
        );
        Ok(report)
    }

    fn render_window(&self, window: &Window<'_>, plan: &RenderPlan, kind: PlotKind) -> Result<PathBuf> {
        let describe = |err: Error| Error::RenderFailure {
            window: format!("{}@{}", window.firm(), window.end_row()),
            reason: err.to_string(),
        };

        let end = window.end_time(&self.time_column).map_err(describe)?;
        let path = self.file_name(window.firm(), &plan.indicator, plan.signal, end, kind);

        let img = match kind {
            PlotKind::Line => {
                let x: Vec<f64> = window
                    .times(&self.time_column)
                    .map_err(describe)?
                    .iter()
                    .map(|t| t.and_utc().timestamp() as f64)
                    .collect();
                let y = window.values(&plan.plot_var).map_err(describe)?;
                self.line.render(&x, &y)
            }
            PlotKind::Candle => {
                let candles = window.candles(&self.time_column).map_err(describe)?;
                self.candle.render(&candles)
            }
        };

        img.save(&path).map_err(|e| describe(Error::Image(e)))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn price_frame(flags: Vec<bool>) -> Frame {
        let firms = ["AAPL", "AAPL", "AAPL", "AAPL", "GOOG", "GOOG", "GOOG", "GOOG"];
        let close = vec![1.0, 2.0, 1.5, 3.0, 10.0, 9.0, 11.0, 12.0];
        Frame::from_columns(vec![
            ("firm", Column::Text(firms.iter().map(|s| s.to_string()).collect())),
            ("time", Column::Time((1..=4).chain(1..=4).map(day).collect())),
            ("open", Column::Float(close.iter().map(|c| c - 0.5).collect())),
            ("high", Column::Float(close.iter().map(|c| c + 1.0).collect())),
            ("low", Column::Float(close.iter().map(|c| c - 1.0).collect())),
            ("close", Column::Float(close)),
            ("sampled", Column::Bool(flags)),
        ])
        .unwrap()
    }

    fn plan(kinds: Vec<PlotKind>) -> RenderPlan {
        RenderPlan {
            indicator: "rsi".into(),
            signal: Signal::Buy,
            plot_var: "close".into(),
            kinds,
        }
    }

    #[test]
    fn test_windows_stay_inside_firm() {
        let frame = price_frame(vec![false; 8]);
        let renderer = WindowRenderer::new(3, "unused").unwrap();
        let windows: Vec<Window> = renderer.windows(&frame).unwrap().collect();

        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].rows(), &[0, 1, 2]);
        assert_eq!(windows[1].rows(), &[1, 2, 3]);
        assert_eq!(windows[2].rows(), &[4, 5, 6]);
        assert_eq!(windows[3].firm(), "GOOG");
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(WindowState::Pending.classify(true), WindowState::Flagged);
        assert_eq!(WindowState::Pending.classify(false), WindowState::Skipped);
        assert_eq!(WindowState::Flagged.finish(true), WindowState::Rendered);
        assert_eq!(WindowState::Flagged.finish(false), WindowState::Failed);
        assert_eq!(WindowState::Skipped.finish(true), WindowState::Skipped);
    }

    #[test]
    fn test_render_sampled_writes_named_files() {
        let dir = TempDir::new().unwrap();
        let mut flags = vec![false; 8];
        flags[3] = true;
        flags[6] = true;
        let frame = price_frame(flags);

        let renderer = WindowRenderer::new(3, dir.path()).unwrap().image_size(20, 20);
        let report = renderer
            .render_sampled(&frame, "sampled", &plan(vec![PlotKind::Line, PlotKind::Candle]))
            .unwrap();

        assert_eq!(report.rendered.len(), 4);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.windows_rendered, 2);
        assert_eq!(report.windows_failed, 0);
        assert_eq!(report.overwritten, 0);
        assert!(report.failures.is_empty());
        assert!(dir.path().join("AAPL_rsi_buy_2021-01-04_line.jpg").is_file());
        assert!(dir.path().join("GOOG_rsi_buy_2021-01-03_candle.jpg").is_file());
    }

    #[test]
    fn test_candle_failure_is_per_window() {
        let dir = TempDir::new().unwrap();
        let mut flags = vec![false; 8];
        flags[2] = true;
        let mut frame = price_frame(flags);
        frame.drop_column("open");

        let renderer = WindowRenderer::new(3, dir.path()).unwrap();
        let report = renderer
            .render_sampled(&frame, "sampled", &plan(vec![PlotKind::Candle, PlotKind::Line]))
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, PlotKind::Candle);
        assert_eq!(report.rendered.len(), 1);
        assert_eq!(report.windows_failed, 1);
        assert_eq!(report.windows_rendered, 0);
    }

    #[test]
    fn test_same_day_windows_counted_as_overwritten() {
        let dir = TempDir::new().unwrap();
        let hours: Vec<NaiveDateTime> = (9..13)
            .map(|h| {
                NaiveDate::from_ymd_opt(2021, 1, 4)
                    .unwrap()
                    .and_hms_opt(h, 30, 0)
                    .unwrap()
            })
            .collect();
        let frame = Frame::from_columns(vec![
            ("firm", Column::Text(vec!["AAPL".to_string(); 4])),
            ("time", Column::Time(hours)),
            ("close", Column::Float(vec![1.0, 2.0, 1.5, 3.0])),
            ("sampled", Column::Bool(vec![false, false, true, true])),
        ])
        .unwrap();

        let renderer = WindowRenderer::new(2, dir.path()).unwrap();
        let report = renderer
            .render_sampled(&frame, "sampled", &plan(vec![PlotKind::Line]))
            .unwrap();

        assert_eq!(report.windows_rendered, 2);
        assert_eq!(report.overwritten, 1);
        assert_eq!(report.rendered.len(), 1);
        assert!(dir.path().join("AAPL_rsi_buy_2021-01-04_line.jpg").is_file());
    }

    #[test]
    fn test_incomplete_windows_counted() {
        let dir = TempDir::new().unwrap();
        let mut flags = vec![false; 8];
        flags[0] = true;
        flags[5] = true;
        let frame = price_frame(flags);

        let renderer = WindowRenderer::new(3, dir.path()).unwrap();
        let report = renderer
            .render_sampled(&frame, "sampled", &plan(vec![PlotKind::Line]))
            .unwrap();

        assert_eq!(report.incomplete, 2);
        assert!(report.rendered.is_empty());
    }

    #[test]
    fn test_missing_flag_column_aborts() {
        let dir = TempDir::new().unwrap();
        let mut frame = price_frame(vec![false; 8]);
        frame.drop_column("sampled");

        let renderer = WindowRenderer::new(3, dir.path()).unwrap();
        let err = renderer
            .render_sampled(&frame, "sampled", &plan(vec![PlotKind::Line]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(WindowRenderer::new(0, "out").is_err());
    }
}
