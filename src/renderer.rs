use glow::{Context, HasContext as _};
use nalgebra::Matrix4;

/// Line-list renderer for wireframe previews.
pub struct GpuLines {
    program: glow::Program,
    vao:     glow::VertexArray,
    vbo:     glow::Buffer,
    vertex_count: i32,
    u_mvp:   glow::UniformLocation,
}

unsafe impl Send for GpuLines {}
unsafe impl Sync for GpuLines {}

const VERTEX_SHADER: &str = r#"#version 300 es
    precision highp float;
    uniform mat4 u_mvp;
    layout(location = 0) in vec3 a_pos;
    layout(location = 1) in vec3 a_col;
    out vec3 v_col;
    void main() {
        v_col       = a_col;
        gl_Position = u_mvp * vec4(a_pos, 1.0);
    }"#;

const FRAGMENT_SHADER: &str = r#"#version 300 es
    precision mediump float;
    in  vec3 v_col;
    out vec4 o_col;
    void main() { o_col = vec4(v_col, 1.0); }"#;

/// 6 floats per vertex: xyz rgb
const FLOATS_PER_VERTEX: usize = 6;

/// GL objects created so far; released newest-first when setup fails.
struct Created<T>(Vec<T>);

impl<T> Created<T> {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, item: T) {
        self.0.push(item);
    }

    fn unwind(self, mut release: impl FnMut(T)) {
        for item in self.0.into_iter().rev() {
            release(item);
        }
    }
}

enum GlObject {
    Program(glow::Program),
    VertexArray(glow::VertexArray),
    Buffer(glow::Buffer),
}

unsafe fn release(gl: &Context, object: GlObject) {
    unsafe {
        match object {
            GlObject::Program(p) => gl.delete_program(p),
            GlObject::VertexArray(v) => gl.delete_vertex_array(v),
            GlObject::Buffer(b) => gl.delete_buffer(b),
        }
    }
}

impl GpuLines {
    pub unsafe fn new(gl: &Context) -> Result<Self, String> {
        let mut created = Created::new();
        match unsafe { Self::build(gl, &mut created) } {
            Ok(lines) => Ok(lines),
            Err(e) => {
                created.unwind(|object| unsafe { release(gl, object) });
                Err(e)
            }
        }
    }

    unsafe fn build(gl: &Context, created: &mut Created<GlObject>) -> Result<Self, String> {
        unsafe {
            let program = gl.create_program()?;
            created.push(GlObject::Program(program));

            let mut shaders = Vec::with_capacity(2);
            for (kind, source) in [
                (glow::VERTEX_SHADER, VERTEX_SHADER),
                (glow::FRAGMENT_SHADER, FRAGMENT_SHADER),
            ] {
                let shader = gl.create_shader(kind)?;
                gl.shader_source(shader, source);
                gl.compile_shader(shader);
                if !gl.get_shader_compile_status(shader) {
                    let info = gl.get_shader_info_log(shader);
                    gl.delete_shader(shader);
                    for shader in shaders {
                        gl.delete_shader(shader);
                    }
                    return Err(format!("shader compile failed: {info}"));
                }
                gl.attach_shader(program, shader);
                shaders.push(shader);
            }
            gl.link_program(program);
            for shader in shaders {
                gl.detach_shader(program, shader);
                gl.delete_shader(shader);
            }
            if !gl.get_program_link_status(program) {
                let info = gl.get_program_info_log(program);
                return Err(format!("program link failed: {info}"));
            }

            let vao = gl.create_vertex_array()?;
            created.push(GlObject::VertexArray(vao));
            let vbo = gl.create_buffer()?;
            created.push(GlObject::Buffer(vbo));

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 24, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, 24, 12);
            gl.bind_vertex_array(None);

            let u_mvp = gl
                .get_uniform_location(program, "u_mvp")
                .ok_or("u_mvp uniform missing")?;

            Ok(Self { program, vao, vbo, vertex_count: 0, u_mvp })
        }
    }

    pub unsafe fn upload_vertices(&mut self, gl: &Context, verts: &[f32]) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(verts),
                glow::STATIC_DRAW,
            );
        }
        self.vertex_count = i32::try_from(verts.len() / FLOATS_PER_VERTEX).unwrap_or(i32::MAX);
    }

    pub unsafe fn paint(&self, gl: &Context, mvp: Matrix4<f32>) {
        if self.vertex_count == 0 {
            return;
        }
        unsafe {
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(Some(&self.u_mvp), false, mvp.as_slice());
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::LINES, 0, self.vertex_count);
            gl.bind_vertex_array(None);
        }
    }

    pub unsafe fn destroy(&self, gl: &Context) {
        unsafe {
            gl.delete_program(self.program);
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Created;

    #[test]
    fn failed_setup_releases_everything_newest_first() {
        let mut created = Created::new();
        created.push("program");
        created.push("vertex array");
        created.push("buffer");
        let mut released = Vec::new();
        created.unwind(|object| released.push(object));
        assert_eq!(released, ["buffer", "vertex array", "program"]);
    }

    #[test]
    fn nothing_to_release_before_the_program_exists() {
        let mut released = Vec::<&str>::new();
        Created::new().unwind(|object| released.push(object));
        assert!(released.is_empty());
    }
}
