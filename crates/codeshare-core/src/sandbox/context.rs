//! In-memory build context for a single run.

use std::io;

use super::recipe::ExecutionRecipe;

/// Pack the submitted source and its recipe into a tar archive.
///
/// The source lands at the archive root under the recipe's script name and
/// the recipe under `dockerfiles/`. No host files are read.
pub fn build_context(recipe: &ExecutionRecipe, source: &str) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    append_file(&mut builder, recipe.script_filename(), source.as_bytes())?;
    append_file(
        &mut builder,
        &recipe.dockerfile_path(),
        recipe.dockerfile.as_bytes(),
    )?;
    builder.into_inner()
}

fn append_file(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    builder.append_data(&mut header, path, data)
}
