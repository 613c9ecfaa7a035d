//! Line-based keyboard commands read from the terminal

/// One-cell step on the board. Y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    Quit,
}

/// Maps a single key to a command. W/A/S/D move, Q quits; case is ignored.
pub fn parse_key(key: char) -> Option<Command> {
    match key.to_ascii_lowercase() {
        'w' => Some(Command::Move(Direction::Up)),
        'a' => Some(Command::Move(Direction::Left)),
        's' => Some(Command::Move(Direction::Down)),
        'd' => Some(Command::Move(Direction::Right)),
        'q' => Some(Command::Quit),
        _ => None,
    }
}

/// Parses every recognised key on a line, in order. Anything after a quit is dropped.
pub fn parse_line(line: &str) -> Vec<Command> {
    let mut commands = Vec::new();

    for command in line.chars().filter_map(parse_key) {
        commands.push(command);
        if command == Command::Quit {
            break;
        }
    }

    commands
}
