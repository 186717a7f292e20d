//! Chromium-backed reader session. Owns the browser process and
//! exposes the page as a [`PageSource`]: clipped screenshots for
//! capture, ArrowRight key events for page turns.

use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType,
};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::{error, info};
use tokio::task::JoinHandle;

use crate::capture::PageSource;
use crate::settings::Settings;

pub struct ReaderSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    clip: Viewport,
}

impl ReaderSession {
    /// Launch a visible Chromium with a persistent profile and open
    /// the reader URL. The profile directory keeps the login session
    /// alive between runs.
    pub async fn launch(settings: &Settings) -> Result<Self> {
        let config = BrowserConfig::builder()
            .with_head()
            .user_data_dir(&settings.profile_dir)
            .window_size(settings.viewport_width, settings.viewport_height)
            .build()
            .map_err(|err| anyhow!("browser config invalid: {err}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    error!("CDP handler error: {err}");
                }
            }
        });

        let page = browser
            .new_page(settings.reader_url.as_str())
            .await
            .with_context(|| format!("failed to open {}", settings.reader_url))?;
        page.wait_for_navigation()
            .await
            .context("reader page never finished loading")?;

        // Pin the render surface so the clip geometry stays valid no
        // matter how the OS sizes the window.
        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(settings.viewport_width as i64)
            .height(settings.viewport_height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|err| anyhow!("device metrics invalid: {err}"))?;
        page.execute(metrics)
            .await
            .context("failed to set viewport metrics")?;

        info!("Reader session ready at {}", settings.reader_url);

        let clip = Viewport {
            x: 0.0,
            y: settings.clip_top as f64,
            width: settings.viewport_width as f64,
            height: settings.clip_height() as f64,
            scale: 1.0,
        };

        Ok(Self {
            browser,
            page,
            handler,
            clip,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .context("failed to close browser")?;
        self.browser.wait().await.context("browser did not exit")?;
        self.handler.abort();
        Ok(())
    }
}

impl PageSource for ReaderSession {
    async fn capture(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(self.clip.clone())
            .build();
        self.page
            .screenshot(params)
            .await
            .context("screenshot capture failed")
    }

    async fn advance(&self) -> Result<()> {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let event = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key("ArrowRight")
                .code("ArrowRight")
                .windows_virtual_key_code(39)
                .native_virtual_key_code(39)
                .build()
                .map_err(|err| anyhow!("key event invalid: {err}"))?;
            self.page
                .execute(event)
                .await
                .context("page turn key event failed")?;
        }
        Ok(())
    }
}
