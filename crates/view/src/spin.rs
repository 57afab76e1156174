/// Cosmetic rotation driven by shift-drag. Angles are degrees, matching the
/// pointer delta in device pixels one to one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpinTransform {
    spin_x_degrees: f32,
    spin_y_degrees: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinTransformError {
    NonFiniteValue,
}

impl SpinTransform {
    pub fn spin_x(&self) -> f32 {
        self.spin_x_degrees
    }

    pub fn spin_y(&self) -> f32 {
        self.spin_y_degrees
    }

    pub fn is_identity(&self) -> bool {
        self.spin_x_degrees == 0.0 && self.spin_y_degrees == 0.0
    }

    pub fn set_spin(&mut self, spin_x: f32, spin_y: f32) -> Result<(), SpinTransformError> {
        if !spin_x.is_finite() || !spin_y.is_finite() {
            return Err(SpinTransformError::NonFiniteValue);
        }
        self.spin_x_degrees = spin_x;
        self.spin_y_degrees = spin_y;
        Ok(())
    }

    /// Accumulates a pointer delta. The spin moves against the drag.
    pub fn increment_spin(
        &mut self,
        delta_x: f32,
        delta_y: f32,
    ) -> Result<(), SpinTransformError> {
        let next_x = checked_sub(self.spin_x_degrees, delta_x)?;
        let next_y = checked_sub(self.spin_y_degrees, delta_y)?;
        self.spin_x_degrees = next_x;
        self.spin_y_degrees = next_y;
        Ok(())
    }

    /// Rotation about X by `-spin_x`, then about Y by `-spin_y`.
    pub fn to_matrix3x3(&self) -> [[f32; 3]; 3] {
        let (sine_x, cosine_x) = (-self.spin_x_degrees).to_radians().sin_cos();
        let (sine_y, cosine_y) = (-self.spin_y_degrees).to_radians().sin_cos();

        [
            [cosine_y, 0.0, sine_y],
            [sine_x * sine_y, cosine_x, -sine_x * cosine_y],
            [-cosine_x * sine_y, sine_x, cosine_x * cosine_y],
        ]
    }

    /// Column-major 4x4 form of `to_matrix3x3`, ready for a WGSL `mat4x4<f32>`.
    pub fn to_matrix4x4(&self) -> [f32; 16] {
        let m = self.to_matrix3x3();
        [
            m[0][0], m[1][0], m[2][0], 0.0, //
            m[0][1], m[1][1], m[2][1], 0.0, //
            m[0][2], m[1][2], m[2][2], 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

fn checked_sub(current: f32, delta: f32) -> Result<f32, SpinTransformError> {
    if !delta.is_finite() {
        return Err(SpinTransformError::NonFiniteValue);
    }
    let next = current - delta;
    if !next.is_finite() {
        return Err(SpinTransformError::NonFiniteValue);
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn default_spin_is_identity_matrix() {
        let spin = SpinTransform::default();
        assert!(spin.is_identity());
        let matrix = spin.to_matrix4x4();
        let identity = [
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ];
        for (got, expected) in matrix.iter().zip(identity) {
            assert!(approx(*got, expected));
        }
    }

    #[test]
    fn increment_accumulates_against_the_drag() {
        let mut spin = SpinTransform::default();
        spin.increment_spin(3.0, -2.0).expect("first increment");
        spin.increment_spin(1.0, 1.0).expect("second increment");
        assert!(approx(spin.spin_x(), -4.0));
        assert!(approx(spin.spin_y(), 1.0));

        spin.set_spin(0.0, 0.0).expect("reset spin");
        assert!(spin.is_identity());
    }

    #[test]
    fn rotation_about_y_moves_x_axis_into_depth() {
        let mut spin = SpinTransform::default();
        spin.set_spin(0.0, -90.0).expect("set spin");
        let matrix = spin.to_matrix3x3();
        // Rotating +90 degrees about Y maps +X to -Z.
        assert!(approx(matrix[0][0], 0.0));
        assert!(approx(matrix[2][0], -1.0));
        assert!(approx(matrix[1][1], 1.0));
    }

    #[test]
    fn rejects_non_finite_input() {
        let mut spin = SpinTransform::default();
        assert_eq!(
            spin.increment_spin(f32::NAN, 0.0),
            Err(SpinTransformError::NonFiniteValue)
        );
        assert_eq!(
            spin.set_spin(f32::INFINITY, 0.0),
            Err(SpinTransformError::NonFiniteValue)
        );
        assert!(spin.is_identity());
    }
}
