use glam::{Mat4, Vec3};

/// 旋转使用欧拉角，单位为角度
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}
impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}
impl Transform {
    #[inline]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// T * Ry * Rx * Rz * S
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        assert!(Transform::default().model_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_scale_then_rotate_then_translate() {
        let t = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, 90.0, 0.0),
            scale: Vec3::splat(2.0),
        };
        // +X 缩放到 2，再绕 Y 转 90 度到 -Z，最后平移
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5), "{p:?}");
    }

    #[test]
    fn test_rotation_order() {
        let t = Transform {
            rotation: Vec3::new(90.0, 90.0, 0.0),
            ..Default::default()
        };
        // 先绕 X：+Y -> +Z，再绕 Y：+Z -> +X
        let p = t.model_matrix().transform_vector3(Vec3::Y);
        assert!(p.abs_diff_eq(Vec3::X, 1e-5), "{p:?}");
    }
}
