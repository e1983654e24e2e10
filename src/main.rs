use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rhdfs::{ClientConfig, DfsClient, LocalStorage, StorageConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "以本地目录为根的分布式文件系统客户端", long_about = None)]
struct Args {
    /// 存储根目录
    #[arg(short, long, default_value = "data")]
    root: PathBuf,

    /// 以哪个用户身份执行（默认当前用户）
    #[arg(short, long)]
    user: Option<String>,

    /// JSON 格式的客户端配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 回收站保留时间（分钟），0 表示关闭回收站
    #[arg(long, default_value = "1440")]
    trash_minutes: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出目录内容
    Ls {
        path: String,
        /// 只显示目录
        #[arg(short, long)]
        dirs: bool,
    },
    /// 显示单个路径的状态
    Stat { path: String },
    /// 创建目录
    Mkdir {
        path: String,
        /// 所有人可读写
        #[arg(long)]
        shared: bool,
    },
    /// 上传本地文件到目录
    Put {
        local: PathBuf,
        dest_dir: String,
        #[arg(long)]
        delete_src: bool,
        #[arg(short, long)]
        force: bool,
    },
    /// 下载文件到本地
    Get { path: String, local: PathBuf },
    /// 输出文件内容
    Cat { path: String },
    /// 把标准输入写入文件（覆盖）
    Write { path: String },
    /// 追加字符串到文件
    Append { path: String, content: String },
    /// 删除（默认移入回收站）
    Rm {
        path: String,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        skip_trash: bool,
    },
    /// 移动
    Mv { src: String, dest: String },
    /// 复制
    Cp { src: String, dest: String },
    /// 重命名
    Rename { src: String, dest: String },
    /// 修改权限，例如 -rwxr-x--- 或 750
    Chmod { path: String, mode: String },
    /// 修改属主/属组
    Chown {
        path: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        group: Option<String>,
    },
    /// 显示文件块位置
    Blocks { path: String },
    /// 显示容量
    Df,
    /// 回收站操作
    Trash {
        #[command(subcommand)]
        action: TrashCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TrashCommand {
    /// 显示回收站目录
    Dir,
    /// 从回收站恢复
    Restore { trashed: String, dest: String },
    /// 清理过期检查点
    Expunge {
        /// 立即清空全部内容
        #[arg(long)]
        all: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_client(args: &Args) -> anyhow::Result<DfsClient> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("加载配置失败: {:?}", path))?,
        None => ClientConfig::default(),
    };
    if let Some(user) = &args.user {
        config = config.with_user(user.clone());
    }

    std::fs::create_dir_all(&args.root)
        .with_context(|| format!("创建存储根目录失败: {:?}", args.root))?;
    let storage = LocalStorage::new(args.root.clone())
        .with_config(StorageConfig::default().with_trash_interval_minutes(args.trash_minutes));
    info!("初始化客户端，存储根目录={:?}", args.root);

    Ok(DfsClient::new(config, Arc::new(storage))?)
}

fn run(client: &DfsClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ls { path, dirs } => {
            let only_dirs = |s: &rhdfs::FileStatus| s.is_dir;
            let filter: Option<&dyn Fn(&rhdfs::FileStatus) -> bool> = if dirs { Some(&only_dirs) } else { None };
            print_json(&client.list(&path, filter)?)?;
        }
        Command::Stat { path } => print_json(&client.file_entry(&path)?)?,
        Command::Mkdir { path, shared } => {
            let created = if shared {
                client.create_shared_dir(&path)?
            } else {
                client.mkdir(&path)?
            };
            println!("{}", created);
        }
        Command::Put {
            local,
            dest_dir,
            delete_src,
            force,
        } => print_json(&client.upload_local(&local, &dest_dir, delete_src, force)?)?,
        Command::Get { path, local } => {
            let saved = client.download_to_local(&path, &local)?;
            println!("{}", saved.display());
        }
        Command::Cat { path } => {
            client.download_to_response(&path, io::stdout().lock())?;
        }
        Command::Write { path } => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            client.put_string(&path, &content)?;
        }
        Command::Append { path, content } => client.append_string(&path, &content)?,
        Command::Rm {
            path,
            recursive,
            skip_trash,
        } => {
            if !client.rmdir(&path, recursive, skip_trash) {
                bail!("删除失败: {}", path);
            }
        }
        Command::Mv { src, dest } => {
            if !client.move_path(&src, &dest)? {
                bail!("移动失败: {} -> {}", src, dest);
            }
        }
        Command::Cp { src, dest } => client.copy(&src, &dest)?,
        Command::Rename { src, dest } => {
            if !client.rename(&src, &dest)? {
                bail!("重命名失败: {} -> {}", src, dest);
            }
        }
        Command::Chmod { path, mode } => {
            if !client.chmod(&path, &mode) {
                bail!("修改权限失败: {}", path);
            }
        }
        Command::Chown { path, owner, group } => {
            let permission = client.update_owner(&path, owner.as_deref(), group.as_deref())?;
            println!("{}", permission);
        }
        Command::Blocks { path } => print_json(&client.block_locations(&path))?,
        Command::Df => print_json(&client.status()?)?,
        Command::Trash { action } => match action {
            TrashCommand::Dir => println!("{}", client.trash_dir_path()?),
            TrashCommand::Restore { trashed, dest } => {
                client.restore_from_trash(&trashed, &dest)?;
            }
            TrashCommand::Expunge { all } => {
                client.empty_trash(all)?;
            }
        },
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let client = build_client(&args)?;
    let result = run(&client, args.command);
    client.close()?;
    result
}
