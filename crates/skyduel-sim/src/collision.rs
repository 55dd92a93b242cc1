//! Axis-aligned boxes and the one circle test the aura needs.

/// A box given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn square(x: f32, y: f32, size: f32) -> Self {
        Self::new(x, y, size, size)
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict overlap: touching edges do not count.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

/// Whether a circle around `a`'s center with `radius` reaches a circle
/// around `b`'s center with half of `b`'s larger side.
pub fn aura_reaches(a: &Aabb, radius: f32, b: &Aabb) -> bool {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    let dist = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
    dist < radius + b.w.max(b.h) / 2.0
}

/// Whether a vertical beam `[cx - width/2, cx + width/2]` running from
/// `top` to `bottom` touches `target`.
///
/// Edges count on the x axis, matching how the beam is drawn.
pub fn beam_hits(cx: f32, width: f32, top: f32, bottom: f32, target: &Aabb) -> bool {
    let left = cx - width / 2.0;
    let right = cx + width / 2.0;
    target.right() >= left && target.x <= right && target.bottom() > top && target.y < bottom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlaps_excludes_touching_edges() {
        let a = Aabb::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&Aabb::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Aabb::new(10.0, 0.0, 10.0, 10.0)));
        assert!(!a.overlaps(&Aabb::new(0.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_aura_reaches_uses_target_half_extent() {
        let enemy = Aabb::square(0.0, 0.0, 100.0);
        // Centers 150 apart; 50 aura + 60 half-extent = 110 < 150.
        let far = Aabb::square(140.0, 0.0, 120.0);
        assert!(!aura_reaches(&enemy, 50.0, &far));
        // 85 aura + 60 = 145 < 150 still misses, 95 reaches.
        assert!(!aura_reaches(&enemy, 85.0, &far));
        assert!(aura_reaches(&enemy, 95.0, &far));
    }

    #[test]
    fn test_beam_hits_only_above_origin() {
        let above = Aabb::square(95.0, 100.0, 20.0);
        let below = Aabb::square(95.0, 500.0, 20.0);
        assert!(beam_hits(100.0, 8.0, 0.0, 400.0, &above));
        assert!(!beam_hits(100.0, 8.0, 0.0, 400.0, &below));
        assert!(!beam_hits(200.0, 8.0, 0.0, 400.0, &above));
    }
}
