use crate::sampler::Accumulator;
use crossterm::style::{self, Stylize};
use crossterm::{cursor, execute, queue, terminal};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// RAII guard for the interactive terminal session: raw mode, alternate
/// screen, hidden cursor. Restores everything on drop so a panic or early
/// return cannot leave the shell unusable.
pub struct TerminalSession {
    out: io::Stdout,
}

impl TerminalSession {
    pub fn enter() -> io::Result<Self> {
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All)
        )?;
        Ok(Self { out })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(
            self.out,
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();
    }
}

/// Draws the accumulator with half-block cells — two vertical pixels per
/// character, 24-bit color. The buffer's origin is bottom-left, so rows are
/// walked from the top down.
pub fn draw(accumulator: &Accumulator, out: &mut impl Write) -> io::Result<()> {
    if accumulator.is_empty() {
        return Ok(());
    }
    let width = accumulator.width() as usize;
    let height = accumulator.height() as usize;
    let rows = height / 2;

    queue!(out, cursor::MoveTo(0, 0))?;
    for row in 0..rows {
        let top_y = height - 1 - row * 2;
        let bottom_y = top_y - 1;
        for x in 0..width {
            let (tr, tg, tb) = accumulator.srgb(top_y * width + x);
            let (br, bg, bb) = accumulator.srgb(bottom_y * width + x);
            queue!(
                out,
                style::PrintStyledContent(
                    "▀".with(style::Color::Rgb {
                        r: tr,
                        g: tg,
                        b: tb
                    })
                    .on(style::Color::Rgb {
                        r: br,
                        g: bg,
                        b: bb
                    })
                )
            )?;
        }
        queue!(out, cursor::MoveToNextLine(1))?;
    }
    out.flush()
}

/// Status line rendered under the image.
pub fn draw_status(out: &mut impl Write, row: u16, status: &str) -> io::Result<()> {
    queue!(
        out,
        cursor::MoveTo(0, row),
        terminal::Clear(terminal::ClearType::CurrentLine)
    )?;
    write!(out, "{status}")?;
    out.flush()
}

// ─── Screenshots ────────────────────────────────────────────────────────────

/// Writes the accumulator as plain-text PPM (P3): gamma-2 corrected 8-bit
/// triples, rows top-to-bottom.
pub fn write_ppm(accumulator: &Accumulator, path: &Path) -> io::Result<()> {
    let width = accumulator.width() as usize;
    let height = accumulator.height() as usize;

    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write!(file, "P3\n{width} {height}\n255\n")?;
    for y in (0..height).rev() {
        for x in 0..width {
            let (r, g, b) = accumulator.srgb(y * width + x);
            writeln!(file, "{r} {g} {b}")?;
        }
    }
    file.flush()
}

/// Picks the first unused `screenshot-N.ppm` name inside `dir`, creating
/// the directory when missing.
pub fn next_screenshot_path(dir: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    for n in 1.. {
        let candidate = dir.join(format!("screenshot-{n}.ppm"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    unreachable!("unbounded counter");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Color;

    fn checker_accumulator() -> Accumulator {
        let acc = Accumulator::new(2, 2);
        acc.replace(0, Color::zero()); // bottom-left
        acc.replace(1, Color::ones()); // bottom-right
        acc.replace(2, Color::ones()); // top-left
        acc.replace(3, Color::zero()); // top-right
        acc
    }

    #[test]
    fn ppm_is_written_top_row_first() {
        let acc = checker_accumulator();
        let path = std::env::temp_dir().join(format!("lumen-ppm-{}.ppm", std::process::id()));
        write_ppm(&acc, &path).expect("write ppm");
        let contents = std::fs::read_to_string(&path).expect("read back");
        let _ = std::fs::remove_file(&path);

        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("P3"));
        assert_eq!(lines.next(), Some("2 2"));
        assert_eq!(lines.next(), Some("255"));
        // Top row (indices 2, 3) comes first: white then black.
        assert_eq!(lines.next(), Some("255 255 255"));
        assert_eq!(lines.next(), Some("0 0 0"));
        assert_eq!(lines.next(), Some("0 0 0"));
        assert_eq!(lines.next(), Some("255 255 255"));
    }

    #[test]
    fn draw_emits_half_blocks_for_every_column() {
        let acc = checker_accumulator();
        let mut sink = Vec::new();
        draw(&acc, &mut sink).expect("draw");
        let text = String::from_utf8_lossy(&sink);
        assert_eq!(text.matches('▀').count(), 2);
    }

    #[test]
    fn screenshot_names_do_not_collide() {
        let dir = std::env::temp_dir().join(format!("lumen-shots-{}", std::process::id()));
        let first = next_screenshot_path(&dir).expect("first name");
        std::fs::write(&first, b"x").expect("claim name");
        let second = next_screenshot_path(&dir).expect("second name");
        assert_ne!(first, second);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
