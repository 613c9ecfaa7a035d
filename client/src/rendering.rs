//! Text rendering of the board

use shared::{PositionRecord, BOARD_HEIGHT, BOARD_WIDTH};
use std::fmt::Write;

const BORDER: char = '#';
const EMPTY: char = ' ';
const LOCAL: char = 'o';
const REMOTE: char = 'X';

/// Clears the terminal and homes the cursor
pub const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    pub width: usize,
    pub height: usize,
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Grid cell for a position, if it falls on the board. Coordinates are truncated.
    pub fn cell(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }

        let (col, row) = (x as usize, y as usize);
        if col < self.width && row < self.height {
            Some((col, row))
        } else {
            None
        }
    }

    /// Draws the border, the local player and everyone else. Remote players are
    /// drawn last, so they win a shared cell.
    pub fn render(&self, local: (f32, f32), others: &[PositionRecord]) -> String {
        let mut grid = vec![vec![EMPTY; self.width]; self.height];

        for (row, line) in grid.iter_mut().enumerate() {
            for (col, cell) in line.iter_mut().enumerate() {
                if row == 0 || row + 1 == self.height || col == 0 || col + 1 == self.width {
                    *cell = BORDER;
                }
            }
        }

        if let Some((col, row)) = self.cell(local.0, local.1) {
            grid[row][col] = LOCAL;
        }

        for other in others {
            if let Some((col, row)) = self.cell(other.x, other.y) {
                grid[row][col] = REMOTE;
            }
        }

        let mut out = String::with_capacity(self.height * (self.width * 2 + 1));
        for line in &grid {
            for cell in line {
                out.push(*cell);
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }

    /// Full frame: board, local position line and the key help
    pub fn frame(&self, local: (f32, f32), others: &[PositionRecord]) -> String {
        let mut out = self.render(local, others);
        let _ = writeln!(out, "\nPlayer position: ({:.2}, {:.2})", local.0, local.1);
        let _ = writeln!(out, "Enter move (w/a/s/d) or q to quit:");
        out
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BOARD_WIDTH, BOARD_HEIGHT)
    }
}
