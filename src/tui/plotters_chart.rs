//! Plotters-powered HRR chart widget for Ratatui.
//!
//! Plotters gives nicer axes than Ratatui's built-in `Chart` widget; its
//! output is drawn into the Ratatui buffer via `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A render-only chart description.
///
/// All series and bounds are computed outside the render call.
pub struct HrrPlottersChart<'a> {
    /// Line series for the fitted HRR.
    pub fitted: &'a [(f64, f64)],
    /// Scatter series for the observed HRR.
    pub observed: &'a [(f64, f64)],
    /// Observed samples with the largest residuals (a subset of `observed`).
    pub outliers: &'a [(f64, f64)],
    /// X bounds (°C).
    pub x_bounds: [f64; 2],
    /// Y bounds (W/g).
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl Widget for HrrPlottersChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters may fail to lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let fitted_color = RGBColor(0, 255, 255);
            let observed_color = WHITE;
            let outlier_color = RGBColor(255, 0, 0);

            chart.draw_series(LineSeries::new(self.fitted.iter().copied(), &fitted_color))?;

            chart.draw_series(
                self.observed
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), observed_color)),
            )?;

            // `Circle` radii come out wrong through the ratatui backend; a
            // colored pixel overrides the white observation instead.
            chart.draw_series(
                self.outliers
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), outlier_color)),
            )?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
