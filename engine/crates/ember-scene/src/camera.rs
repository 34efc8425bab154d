use glam::{Mat4, Vec3};

/// 第一人称相机
///
/// 朝向由 yaw / pitch（角度）决定，每次旋转之后重新计算 front / right / up
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,

    /// 竖直方向的视野，单位为角度
    pub fov_deg: f32,
    pub aspect_ratio: f32,
    pub near_plane: f32,
    pub far_plane: f32,

    yaw_deg: f32,
    pitch_deg: f32,
    sensitivity: f32,
    speed: f32,
}
impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            fov_deg: 45.0,
            aspect_ratio: 16.0 / 9.0,
            near_plane: 0.1,
            far_plane: 100.0,
            yaw_deg: -90.0,
            pitch_deg: 0.0,
            sensitivity: 100.0,
            speed: 5.0,
        };
        camera.recalculate_vectors();
        camera
    }
}
// getters
impl Camera {
    const WORLD_UP: Vec3 = Vec3::Y;
    const PITCH_LIMIT: f32 = 89.0;

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn yaw_deg(&self) -> f32 {
        self.yaw_deg
    }

    #[inline]
    pub fn pitch_deg(&self) -> f32 {
        self.pitch_deg
    }
}
// matrices
impl Camera {
    /// 右手系 look-at
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// depth 映射到 0..1，Y 轴翻转以匹配 Vulkan 的 NDC
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_deg.to_radians(), self.aspect_ratio, self.near_plane, self.far_plane);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// 窗口最小化时宽高可能为 0，此时保持原来的比例
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }
}
// controls
impl Camera {
    pub fn move_by(&mut self, direction: Vec3, delta_time: f32) {
        self.position += direction * self.speed * delta_time;
    }

    /// x_offset / y_offset 为鼠标在屏幕上的位移，屏幕 y 向下
    pub fn rotate(&mut self, x_offset: f32, y_offset: f32, delta_time: f32) {
        self.yaw_deg += x_offset * self.sensitivity * delta_time;
        self.pitch_deg -= y_offset * self.sensitivity * delta_time;
        self.pitch_deg = self.pitch_deg.clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.recalculate_vectors();
    }

    fn recalculate_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw_deg.to_radians(), self.pitch_deg.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos()).normalize();
        self.right = self.front.cross(Self::WORLD_UP).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orientation() {
        let camera = Camera::default();
        assert!(camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
        assert!(camera.up().abs_diff_eq(Vec3::Y, 1e-6));
        assert_eq!(camera.fov_deg, 45.0);
        assert_eq!(camera.near_plane, 0.1);
        assert_eq!(camera.far_plane, 100.0);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(0.0, -1000.0, 1.0);
        assert_eq!(camera.pitch_deg(), 89.0);
        camera.rotate(0.0, 5000.0, 1.0);
        assert_eq!(camera.pitch_deg(), -89.0);
        assert!(camera.front().y < 0.0);
    }

    #[test]
    fn test_move_uses_speed_and_dt() {
        let mut camera = Camera::default();
        let front = camera.front();
        camera.move_by(front, 0.5);
        assert!(camera.position.abs_diff_eq(Vec3::new(0.0, 0.0, -2.5), 1e-5));
    }

    #[test]
    fn test_projection_is_vulkan_style() {
        let camera = Camera::default();
        let vp = camera.projection_matrix() * camera.view_matrix();

        let above = vp.project_point3(Vec3::new(0.0, 1.0, -5.0));
        assert!(above.y < 0.0, "world up must map to NDC -Y: {above:?}");
        assert!(above.z > 0.0 && above.z < 1.0);

        let near = vp.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = vp.project_point3(Vec3::new(0.0, 0.0, -100.0));
        assert!((near.z - 0.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_viewport_size_ignores_zero() {
        let mut camera = Camera::default();
        camera.set_viewport_size(800, 400);
        assert_eq!(camera.aspect_ratio, 2.0);
        camera.set_viewport_size(0, 400);
        assert_eq!(camera.aspect_ratio, 2.0);
    }
}
