// 构建脚本: 静态链接 FFmpeg 时补齐 Windows 系统库
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // vcpkg 静态 FFmpeg (摄像头 dshow + 无人机 udp) 在 MSVC 下的额外依赖
    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        for lib in ["libmfx", "libx264", "oleaut32", "vfw32", "secur32", "strmiids"] {
            println!("cargo:rustc-link-lib=dylib={}", lib);
        }
    }
}
