// output.rs — 分辨率与显示器模型

use std::fmt;
use std::str::FromStr;

use tokio::process::Command;

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// 图片或屏幕的像素尺寸，宽高都大于 0
///
/// 既用作请求参数（期望的输出尺寸），也用作实际图片的尺寸。
/// 字符串形式为 `"<W>x<H>"`，如 `1920x1080`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 构造分辨率，宽或高为 0 时返回错误
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResolution(format!("{width}x{height}")));
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 宽高比 width / height
    pub fn ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// 两个维度都不小于 `other`
    pub fn covers(&self, other: &Resolution) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidResolution(s.to_string());

        let (w, h) = s.split_once('x').ok_or_else(invalid)?;
        let width = parse_dimension(w).ok_or_else(invalid)?;
        let height = parse_dimension(h).ok_or_else(invalid)?;

        Resolution::new(width, height).map_err(|_| invalid())
    }
}

/// 只接受纯数字且无前导 0，保证 parse 后 format 能还原原字符串
fn parse_dimension(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// 目标显示器：输出 ID（如 `eDP-1`）加上当前分辨率
///
/// ID 为空表示所有输出。分辨率只有经过 [`Monitor::detect`] 才会填上，
/// 没有指定目标分辨率时作为取图的目标尺寸。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Monitor {
    pub id: String,
    pub resolution: Option<Resolution>,
}

impl Monitor {
    pub fn new(id: impl Into<String>, resolution: Option<Resolution>) -> Self {
        Self {
            id: id.into(),
            resolution,
        }
    }

    /// 调用 `xrandr --query` 读取输出的当前分辨率
    ///
    /// `id` 为空时取第一个有当前模式的已连接输出。
    pub async fn detect(id: &str, cancel: &CancelToken) -> Result<Self> {
        let bin = crate::setter::lookup("xrandr")?;
        let mut cmd = Command::new(bin);
        cmd.arg("--query").kill_on_drop(true);

        let out = cancel
            .guard(async {
                cmd.output().await.map_err(|e| Error::Setter {
                    tool: "xrandr".to_string(),
                    source: e,
                })
            })
            .await?;
        if !out.status.success() {
            return Err(Error::SetterFailed {
                tool: "xrandr".to_string(),
                message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        let monitor = parse_xrandr(&String::from_utf8_lossy(&out.stdout), id)?;
        tracing::info!(output = %monitor, resolution = ?monitor.resolution, "detected resolution");
        Ok(monitor)
    }
}

/// 从 xrandr 输出中找到目标输出的当前模式
///
/// 输出行形如 `eDP-1 connected primary 1920x1080+0+0 (normal left ...) ...`，
/// 几何信息 `WxH+X+Y` 只在输出启用时出现。
pub fn parse_xrandr(text: &str, id: &str) -> Result<Monitor> {
    let outputs = text
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace) && !line.starts_with("Screen "))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let connected = fields.next()? == "connected";
            let mode = fields.find_map(current_mode);
            Some((name, connected, mode))
        });

    if id.is_empty() {
        return outputs
            .filter(|(_, connected, _)| *connected)
            .find_map(|(_, _, mode)| mode)
            .map(|res| Monitor::new("", Some(res)))
            .ok_or_else(|| Error::DetectCurrentMode("*".to_string()));
    }

    let mut outputs = outputs;
    let (_, _, mode) = outputs
        .find(|(name, _, _)| *name == id)
        .ok_or_else(|| Error::MonitorNotFound(id.to_string()))?;
    let res = mode.ok_or_else(|| Error::DetectCurrentMode(id.to_string()))?;
    Ok(Monitor::new(id, Some(res)))
}

/// `1920x1080+0+0` → 1920x1080
fn current_mode(field: &str) -> Option<Resolution> {
    let (size, offset) = field.split_once('+')?;
    if offset.is_empty() {
        return None;
    }
    size.parse().ok()
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_format_is_identity() {
        for s in ["1920x1080", "3840x2160", "1x1", "800x600", "2560x1440"] {
            let r: Resolution = s.parse().unwrap();
            assert_eq!(r.to_string(), s);
        }
    }

    #[test]
    fn parse_reads_dimensions() {
        let r: Resolution = "1920x1080".parse().unwrap();
        assert_eq!((r.width(), r.height()), (1920, 1080));
        assert!((r.ratio() - 1.777).abs() < 0.001);
    }

    #[test]
    fn malformed_strings_are_rejected() {
        for s in [
            "", "1920", "1920x", "x1080", "axb", "1920x1080x1", "0x1080", "1920x0", "-1920x1080",
            "1920x-1080", "+1920x1080", "1920 x 1080", "1920X1080", "01920x1080",
        ] {
            assert!(s.parse::<Resolution>().is_err(), "{s:?} should not parse");
        }
    }

    #[test]
    fn zero_dimension_is_rejected_by_constructor() {
        assert!(Resolution::new(0, 10).is_err());
        assert!(Resolution::new(10, 0).is_err());
    }

    #[test]
    fn covers_checks_both_dimensions() {
        let target = Resolution::new(1920, 1080).unwrap();
        assert!(Resolution::new(2000, 1500).unwrap().covers(&target));
        assert!(Resolution::new(1920, 1080).unwrap().covers(&target));
        assert!(!Resolution::new(3840, 1000).unwrap().covers(&target));
    }

    #[test]
    fn monitor_display_defaults_to_wildcard() {
        assert_eq!(Monitor::default().to_string(), "*");
        assert_eq!(Monitor::new("eDP-1", None).to_string(), "eDP-1");
    }

    const XRANDR: &str = "\
Screen 0: minimum 320 x 200, current 4480 x 1440, maximum 16384 x 16384
eDP-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 344mm x 194mm
   1920x1080     60.01*+  59.97
   1680x1050     59.95
HDMI-1 disconnected (normal left inverted right x axis y axis)
DP-1 connected 2560x1440+1920+0 (normal left inverted right x axis y axis) 597mm x 336mm
   2560x1440     59.95*+
DP-2 connected (normal left inverted right x axis y axis)
   1920x1080     60.00 +
";

    #[test]
    fn xrandr_named_output() {
        let m = parse_xrandr(XRANDR, "DP-1").unwrap();
        assert_eq!(m.id, "DP-1");
        assert_eq!(m.resolution, Some(Resolution::new(2560, 1440).unwrap()));
    }

    #[test]
    fn xrandr_without_id_uses_first_active_output() {
        let m = parse_xrandr(XRANDR, "").unwrap();
        assert_eq!(m.id, "");
        assert_eq!(m.resolution, Some(Resolution::new(1920, 1080).unwrap()));
    }

    #[test]
    fn xrandr_missing_or_inactive_outputs() {
        assert!(matches!(
            parse_xrandr(XRANDR, "HDMI-9"),
            Err(Error::MonitorNotFound(id)) if id == "HDMI-9"
        ));
        assert!(matches!(
            parse_xrandr(XRANDR, "DP-2"),
            Err(Error::DetectCurrentMode(id)) if id == "DP-2"
        ));
        assert!(matches!(
            parse_xrandr("Screen 0: minimum 320 x 200\n", ""),
            Err(Error::DetectCurrentMode(_))
        ));
    }
}
