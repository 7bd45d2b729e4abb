use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A rectangle in native pixels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub loc: IVec2,
    pub size: IVec2,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            loc: IVec2::new(x, y),
            size: IVec2::new(width, height),
        }
    }

    /// Whether `point` lies inside, with the same right/bottom exclusive rule as `PtInRect`.
    pub fn contains(&self, point: IVec2) -> bool {
        point.x >= self.loc.x
            && point.y >= self.loc.y
            && point.x < self.loc.x + self.size.x
            && point.y < self.loc.y + self.size.y
    }
}

/// Event timestamps in milliseconds that never go backwards.
///
/// Native ticks wrap around after ~49.7 days, this works as long as two consecutive ticks are
/// less than 2^31 milliseconds apart.
#[derive(Debug, Default, Clone, Copy)]
pub struct TickClock {
    current: u32,
}

impl TickClock {
    /// Get the next event time.
    ///
    /// A `suggested` tick of zero means the caller has no timestamp, `platform_tick` is used
    /// instead.
    pub fn next_tick(&mut self, suggested: u32, platform_tick: impl FnOnce() -> u32) -> u32 {
        let suggested = if suggested == 0 {
            platform_tick()
        } else {
            suggested
        };

        if suggested <= self.current && self.current - suggested < 0x7FFF_FFFF {
            return self.current;
        }

        self.current = suggested;
        suggested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_right_bottom_exclusive() {
        let rect = Rect::new(10, 10, 20, 20);
        assert!(rect.contains(IVec2::new(10, 10)));
        assert!(rect.contains(IVec2::new(29, 29)));
        assert!(!rect.contains(IVec2::new(30, 29)));
        assert!(!rect.contains(IVec2::new(9, 15)));
    }

    #[test]
    fn ticks_never_go_backwards() {
        let mut clock = TickClock::default();
        assert_eq!(clock.next_tick(100, || unreachable!()), 100);
        assert_eq!(clock.next_tick(50, || unreachable!()), 100);
        assert_eq!(clock.next_tick(0, || 120), 120);
        assert_eq!(clock.next_tick(130, || unreachable!()), 130);
    }

    #[test]
    fn ticks_follow_wrap_around() {
        let mut clock = TickClock::default();
        assert_eq!(clock.next_tick(u32::MAX - 5, || 0), u32::MAX - 5);
        // Far "behind" means the native counter wrapped.
        assert_eq!(clock.next_tick(3, || 0), 3);
    }
}
